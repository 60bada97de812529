use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{save_json, BackgroundState, NETWORK_MAP_KEY};
use crate::domain::{NetworkJson, NetworkStatus};
use crate::errors::{PortError, ValidationError};

/// Held while a structural edit of the network map is in progress. Released on drop, so an
/// edit that fails midway still unlocks the map.
struct NetworkMapGuard<'a>(&'a AtomicBool);

impl Drop for NetworkMapGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BackgroundState {
    fn try_lock_network_map(&self) -> Option<NetworkMapGuard<'_>> {
        self.inner
            .network_lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| NetworkMapGuard(&self.inner.network_lock))
    }

    pub fn is_network_map_locked(&self) -> bool {
        self.inner.network_lock.load(Ordering::Acquire)
    }

    pub async fn get_network_map(&self) -> BTreeMap<String, NetworkJson> {
        self.inner.maps.read().await.network_map.clone()
    }

    pub async fn get_network_map_by_key(&self, key: &str) -> Option<NetworkJson> {
        self.inner.maps.read().await.network_map.get(key).cloned()
    }

    pub async fn get_ethereum_chains(&self) -> Vec<String> {
        self.inner
            .maps
            .read()
            .await
            .network_map
            .values()
            .filter(|n| n.is_ethereum)
            .map(|n| n.key.clone())
            .collect()
    }

    pub fn subscribe_network_map(&self) -> broadcast::Receiver<BTreeMap<String, NetworkJson>> {
        self.inner.subjects.network_map.subscribe()
    }

    /// Inserts a new chain or updates the provider and metadata of an existing one. Active chains
    /// are reconnected with the new configuration before the map changes, so a failed reconnect
    /// leaves the map untouched. Returns `false` while another edit holds the lock.
    pub async fn upsert_network_map(&self, data: NetworkJson) -> Result<bool, ValidationError> {
        let Some(_guard) = self.try_lock_network_map() else {
            return Ok(false);
        };

        let existing = self.get_network_map_by_key(&data.key).await;
        let network = match existing {
            Some(existing) => merge_network(existing, data),
            None => data,
        };

        if network.active {
            self.chains().update_chain(&network).await?;
        }
        self.inner
            .maps
            .write()
            .await
            .network_map
            .insert(network.key.clone(), network.clone());
        info!(key = %network.key, "network map upserted");
        self.save_network_map().await;
        Ok(true)
    }

    pub async fn remove_network_map(&self, key: &str) -> Result<bool, ValidationError> {
        let Some(_guard) = self.try_lock_network_map() else {
            return Ok(false);
        };
        let Some(network) = self.get_network_map_by_key(key).await else {
            return Err(PortError::NotFound(format!("network {key}")).into());
        };
        if network.active {
            self.chains().disable_chain(key).await?;
        }
        self.inner.maps.write().await.network_map.remove(key);
        info!(key, "network removed");
        self.save_network_map().await;
        Ok(true)
    }

    pub async fn enable_network_map(&self, key: &str) -> Result<bool, ValidationError> {
        let Some(_guard) = self.try_lock_network_map() else {
            return Ok(false);
        };
        self.ensure_known_network(key).await?;
        self.chains().enable_chain(key).await?;
        self.set_network_active(&[key.to_owned()], true, NetworkStatus::Connecting)
            .await;
        self.save_network_map().await;
        Ok(true)
    }

    pub async fn disable_network_map(&self, key: &str) -> Result<bool, ValidationError> {
        let Some(_guard) = self.try_lock_network_map() else {
            return Ok(false);
        };
        self.ensure_known_network(key).await?;
        self.chains().disable_chain(key).await?;
        self.set_network_active(&[key.to_owned()], false, NetworkStatus::Disconnected)
            .await;
        self.save_network_map().await;
        Ok(true)
    }

    pub async fn enable_all_networks(&self) -> Result<bool, ValidationError> {
        let Some(_guard) = self.try_lock_network_map() else {
            return Ok(false);
        };
        let targets = self.network_keys_where(|n| !n.active).await;
        for key in &targets {
            if let Err(e) = self.chains().enable_chain(key).await {
                warn!(key = %key, "failed to enable chain: {e}");
                continue;
            }
            self.set_network_active(std::slice::from_ref(key), true, NetworkStatus::Connecting)
                .await;
        }
        self.save_network_map().await;
        Ok(true)
    }

    pub async fn disable_all_networks(&self) -> Result<bool, ValidationError> {
        let Some(_guard) = self.try_lock_network_map() else {
            return Ok(false);
        };
        let targets = self.network_keys_where(|n| n.active).await;
        self.set_network_active(&targets, false, NetworkStatus::Disconnected)
            .await;
        for key in &targets {
            if let Err(e) = self.chains().disable_chain(key).await {
                warn!(key = %key, "failed to disconnect chain: {e}");
            }
        }
        self.save_network_map().await;
        Ok(true)
    }

    pub async fn update_network_status(
        &self,
        key: &str,
        status: NetworkStatus,
    ) -> Result<(), ValidationError> {
        {
            let mut maps = self.inner.maps.write().await;
            let network = maps
                .network_map
                .get_mut(key)
                .ok_or_else(|| PortError::NotFound(format!("network {key}")))?;
            network.api_status = status;
        }
        self.save_network_map().await;
        Ok(())
    }

    async fn ensure_known_network(&self, key: &str) -> Result<(), ValidationError> {
        if self.inner.maps.read().await.network_map.contains_key(key) {
            Ok(())
        } else {
            Err(PortError::NotFound(format!("network {key}")).into())
        }
    }

    async fn network_keys_where(&self, pred: impl Fn(&NetworkJson) -> bool) -> Vec<String> {
        self.inner
            .maps
            .read()
            .await
            .network_map
            .values()
            .filter(|n| pred(n))
            .map(|n| n.key.clone())
            .collect()
    }

    async fn set_network_active(&self, keys: &[String], active: bool, status: NetworkStatus) {
        let mut maps = self.inner.maps.write().await;
        for key in keys {
            if let Some(network) = maps.network_map.get_mut(key) {
                network.active = active;
                network.api_status = status;
            }
        }
    }

    async fn save_network_map(&self) {
        let map = self.get_network_map().await;
        if let Err(e) = save_json(self.stores().network_map.as_ref(), NETWORK_MAP_KEY, &map).await
        {
            warn!("failed to persist network map: {e}");
        }
        let _ = self.inner.subjects.network_map.send(map);
    }
}

/// Applies an edit to a known network. Empty provider lists and missing token metadata keep the
/// stored values; activation state is never changed here.
fn merge_network(mut existing: NetworkJson, data: NetworkJson) -> NetworkJson {
    if !data.custom_providers.is_empty() {
        existing.custom_providers = data.custom_providers;
    }
    existing.current_provider = data.current_provider;
    existing.chain = data.chain;
    if data.native_token.is_some() {
        existing.native_token = data.native_token;
    }
    if data.decimals.is_some() {
        existing.decimals = data.decimals;
    }
    existing.block_explorer = data.block_explorer;
    existing
}
