use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{info, warn};

use dapp_gate_core::domain::{AccessType, ChainInfo, ChainState, NetworkJson, NetworkStatus};
use dapp_gate_core::ports::{ChainRegistryPort, EvmApi};
use dapp_gate_core::PortError;

use crate::evm_rpc::JsonRpcEvmApi;

/// Opens an `EvmApi` for a chain slug and provider url.
pub type EvmApiFactory =
    Arc<dyn Fn(&str, &str) -> Result<Arc<dyn EvmApi>, PortError> + Send + Sync>;

struct ChainEntry {
    info: ChainInfo,
    provider: String,
    active: bool,
    status: NetworkStatus,
    api: Option<Arc<dyn EvmApi>>,
}

/// Chain connections held in memory. EVM handles come from the factory, so every (re)connect
/// gets a fresh handle.
pub struct ChainRegistryAdapter {
    chains: Mutex<BTreeMap<String, ChainEntry>>,
    factory: EvmApiFactory,
    reinit_count: AtomicUsize,
}

impl ChainRegistryAdapter {
    pub fn new(factory: EvmApiFactory) -> Self {
        Self {
            chains: Mutex::new(BTreeMap::new()),
            factory,
            reinit_count: AtomicUsize::new(0),
        }
    }

    /// Registry whose EVM chains talk JSON-RPC over HTTP.
    pub fn json_rpc(timeout: std::time::Duration) -> Self {
        Self::new(Arc::new(move |_slug: &str, url: &str| -> Result<Arc<dyn EvmApi>, PortError> {
            let api: Arc<dyn EvmApi> = Arc::new(JsonRpcEvmApi::new(url, timeout)?);
            Ok(api)
        }))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, ChainEntry>>, PortError> {
        self.chains
            .lock()
            .map_err(|e| PortError::Transport(format!("chain registry lock poisoned: {e}")))
    }

    /// Registers a chain. Active EVM chains connect immediately.
    pub fn register(&self, info: ChainInfo, provider: &str, active: bool) -> Result<(), PortError> {
        let api = if active {
            self.open(&info, provider)?
        } else {
            None
        };
        let status = if active {
            NetworkStatus::Connected
        } else {
            NetworkStatus::Disconnected
        };
        self.lock()?.insert(
            info.slug.clone(),
            ChainEntry {
                info,
                provider: provider.to_owned(),
                active,
                status,
                api,
            },
        );
        Ok(())
    }

    /// How many times `init_single_api` has been served.
    pub fn reinit_count(&self) -> usize {
        self.reinit_count.load(Ordering::SeqCst)
    }

    fn open(&self, info: &ChainInfo, provider: &str) -> Result<Option<Arc<dyn EvmApi>>, PortError> {
        match info.access_type {
            AccessType::Evm => (self.factory)(&info.slug, provider).map(Some),
            AccessType::Substrate => Ok(None),
        }
    }
}

#[async_trait]
impl ChainRegistryPort for ChainRegistryAdapter {
    fn chains(&self) -> Vec<ChainInfo> {
        match self.lock() {
            Ok(g) => g.values().map(|c| c.info.clone()).collect(),
            Err(e) => {
                warn!("{e}");
                Vec::new()
            }
        }
    }

    fn chain_info(&self, key: &str) -> Option<ChainInfo> {
        self.lock().ok()?.get(key).map(|c| c.info.clone())
    }

    fn chain_state(&self, key: &str) -> Option<ChainState> {
        self.lock().ok()?.get(key).map(|c| ChainState {
            slug: c.info.slug.clone(),
            active: c.active,
            connection_status: c.status,
        })
    }

    fn evm_api(&self, key: &str) -> Option<Arc<dyn EvmApi>> {
        self.lock()
            .ok()?
            .get(key)
            .filter(|c| c.active)
            .and_then(|c| c.api.clone())
    }

    async fn enable_chain(&self, key: &str) -> Result<bool, PortError> {
        let mut g = self.lock()?;
        let entry = g
            .get_mut(key)
            .ok_or_else(|| PortError::NotFound(format!("chain {key}")))?;
        if entry.active {
            return Ok(false);
        }
        entry.api = self.open(&entry.info, &entry.provider)?;
        entry.active = true;
        entry.status = NetworkStatus::Connected;
        info!(chain = key, "chain enabled");
        Ok(true)
    }

    async fn disable_chain(&self, key: &str) -> Result<bool, PortError> {
        let mut g = self.lock()?;
        let entry = g
            .get_mut(key)
            .ok_or_else(|| PortError::NotFound(format!("chain {key}")))?;
        if !entry.active {
            return Ok(false);
        }
        entry.api = None;
        entry.active = false;
        entry.status = NetworkStatus::Disconnected;
        info!(chain = key, "chain disabled");
        Ok(true)
    }

    async fn init_single_api(&self, key: &str) -> Result<(), PortError> {
        self.reinit_count.fetch_add(1, Ordering::SeqCst);
        let mut g = self.lock()?;
        let entry = g
            .get_mut(key)
            .ok_or_else(|| PortError::NotFound(format!("chain {key}")))?;
        entry.api = self.open(&entry.info, &entry.provider)?;
        entry.status = NetworkStatus::Connected;
        info!(chain = key, "api re-initialised");
        Ok(())
    }

    async fn update_chain(&self, network: &NetworkJson) -> Result<(), PortError> {
        let provider = network
            .custom_providers
            .get(&network.current_provider)
            .cloned()
            .unwrap_or_else(|| network.current_provider.clone());
        let mut g = self.lock()?;
        let info = match g.get(&network.key) {
            Some(entry) => ChainInfo {
                name: network.chain.clone(),
                ..entry.info.clone()
            },
            None => ChainInfo {
                slug: network.key.clone(),
                name: network.chain.clone(),
                access_type: network.access_type(),
                evm_chain_id: None,
            },
        };
        // A failed connect leaves the entry unchanged.
        let api = if network.active {
            self.open(&info, &provider)?
        } else {
            None
        };

        let entry = g.entry(network.key.clone()).or_insert_with(|| ChainEntry {
            info: info.clone(),
            provider: provider.clone(),
            active: false,
            status: NetworkStatus::Disconnected,
            api: None,
        });
        entry.info = info;
        entry.provider = provider;
        if network.active {
            entry.api = api;
            entry.active = true;
            entry.status = NetworkStatus::Connected;
        }
        info!(chain = %network.key, provider = %entry.provider, "chain updated");
        Ok(())
    }
}
