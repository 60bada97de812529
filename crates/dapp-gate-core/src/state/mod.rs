//! Long-lived background service object.
//!
//! [`BackgroundState`] is constructed once at process start with its collaborators injected, and
//! torn down with [`BackgroundState::shutdown`], which flushes pending debounced writes. It is a
//! cheap `Arc` handle; clones share the same state.

mod auth;
mod items;
mod network;
mod requests;
mod tokens;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::config::BackgroundConfig;
use crate::debounce::KeyedDebounce;
use crate::domain::{
    AccessType, AuthorizeRequest, BalanceItem, BalanceJson, ChainInfo, ChainRegistry, ChainState,
    CrowdloanItem, CrowdloanJson, CrowdloanParaState, EvmTokenJson, NetworkJson, NftCollectionJson,
    NftJson, StakingItem, StakingJson, TimestampMs, TransactionHistoryItem,
};
use crate::errors::{PortError, ValidationError};
use crate::ports::{
    ChainRegistryPort, ClockPort, FeePolicy, KeyValueStore, KeyringPort, WalletConnectPort,
};

pub use auth::AuthRequestV2;
pub use tokens::EvmTokenTarget;

/// One persisted store per domain map.
#[derive(Clone)]
pub struct StoreSet {
    pub authorize: Arc<dyn KeyValueStore>,
    pub balance: Arc<dyn KeyValueStore>,
    pub staking: Arc<dyn KeyValueStore>,
    pub crowdloan: Arc<dyn KeyValueStore>,
    pub nft: Arc<dyn KeyValueStore>,
    pub nft_collection: Arc<dyn KeyValueStore>,
    pub network_map: Arc<dyn KeyValueStore>,
    pub evm_token: Arc<dyn KeyValueStore>,
    pub history: Arc<dyn KeyValueStore>,
    pub settings: Arc<dyn KeyValueStore>,
}

impl StoreSet {
    /// Builds every store from `open`, which receives the store's name.
    pub fn from_fn<F>(mut open: F) -> Self
    where
        F: FnMut(&'static str) -> Arc<dyn KeyValueStore>,
    {
        Self {
            authorize: open("authorize"),
            balance: open("balance"),
            staking: open("staking"),
            crowdloan: open("crowdloan"),
            nft: open("nft"),
            nft_collection: open("nft_collection"),
            network_map: open("network_map"),
            evm_token: open("evm_token"),
            history: open("history"),
            settings: open("settings"),
        }
    }
}

/// Collaborators injected into the background state.
#[derive(Clone)]
pub struct BackgroundDeps {
    pub keyring: Arc<dyn KeyringPort>,
    pub chains: Arc<dyn ChainRegistryPort>,
    pub fee_policy: Arc<dyn FeePolicy>,
    pub walletconnect: Arc<dyn WalletConnectPort>,
    pub clock: Arc<dyn ClockPort>,
    pub stores: StoreSet,
}

/// Query for [`BackgroundState::get_dapp_chain_info`].
#[derive(Debug, Clone, Copy)]
pub struct ChainDiscovery<'a> {
    pub auto_active: bool,
    pub access_type: AccessType,
    pub default_chain: Option<&'a str>,
    pub url: &'a str,
}

#[derive(Default)]
pub(crate) struct DomainMaps {
    pub current_account: Option<String>,
    pub network_map: BTreeMap<String, NetworkJson>,
    pub balance: BTreeMap<String, BalanceItem>,
    pub staking: BTreeMap<String, StakingItem>,
    pub crowdloan: BTreeMap<String, CrowdloanItem>,
    pub crowdloan_funds: BTreeMap<String, CrowdloanParaState>,
    pub nft: NftJson,
    pub nft_collection: NftCollectionJson,
    pub chain_registry: BTreeMap<String, ChainRegistry>,
    pub evm_tokens: EvmTokenJson,
    pub history: BTreeMap<String, Vec<TransactionHistoryItem>>,
}

pub(crate) struct Subjects {
    pub auth_requests: broadcast::Sender<Vec<AuthorizeRequest>>,
    pub balance: broadcast::Sender<BalanceJson>,
    pub staking: broadcast::Sender<StakingJson>,
    pub crowdloan: broadcast::Sender<CrowdloanJson>,
    pub nft: broadcast::Sender<NftJson>,
    pub nft_collection: broadcast::Sender<NftCollectionJson>,
    pub chain_registry: broadcast::Sender<BTreeMap<String, ChainRegistry>>,
    pub evm_tokens: broadcast::Sender<EvmTokenJson>,
    pub history: broadcast::Sender<BTreeMap<String, Vec<TransactionHistoryItem>>>,
    pub network_map: broadcast::Sender<BTreeMap<String, NetworkJson>>,
}

impl Subjects {
    fn new(capacity: usize) -> Self {
        Self {
            auth_requests: broadcast::channel(capacity).0,
            balance: broadcast::channel(capacity).0,
            staking: broadcast::channel(capacity).0,
            crowdloan: broadcast::channel(capacity).0,
            nft: broadcast::channel(capacity).0,
            nft_collection: broadcast::channel(capacity).0,
            chain_registry: broadcast::channel(capacity).0,
            evm_tokens: broadcast::channel(capacity).0,
            history: broadcast::channel(capacity).0,
            network_map: broadcast::channel(capacity).0,
        }
    }
}

pub(crate) struct Inner {
    config: BackgroundConfig,
    deps: BackgroundDeps,
    maps: RwLock<DomainMaps>,
    auth: Mutex<auth::AuthRequests>,
    network_lock: AtomicBool,
    subjects: Subjects,
    debounce: KeyedDebounce,
}

#[derive(Clone)]
pub struct BackgroundState {
    inner: Arc<Inner>,
}

impl BackgroundState {
    pub fn new(deps: BackgroundDeps, config: BackgroundConfig) -> Self {
        let subjects = Subjects::new(config.subject_capacity.max(1));
        let debounce = KeyedDebounce::new(config.debounce);
        Self {
            inner: Arc::new(Inner {
                config,
                deps,
                maps: RwLock::new(DomainMaps::default()),
                auth: Mutex::new(auth::AuthRequests::default()),
                network_lock: AtomicBool::new(false),
                subjects,
                debounce,
            }),
        }
    }

    /// Loads persisted network configuration, evm tokens and the current account. Networks in
    /// `defaults` that were never stored are added as-is.
    pub async fn init(&self, defaults: Vec<NetworkJson>) -> Result<(), ValidationError> {
        let stored: BTreeMap<String, NetworkJson> =
            load_json(self.stores().network_map.as_ref(), NETWORK_MAP_KEY)
                .await?
                .unwrap_or_default();
        let evm_tokens: EvmTokenJson = load_json(self.stores().evm_token.as_ref(), EVM_TOKEN_KEY)
            .await?
            .unwrap_or_default();
        let current: Option<CurrentAccountInfo> =
            load_json(self.stores().settings.as_ref(), CURRENT_ACCOUNT_KEY).await?;

        let mut maps = self.inner.maps.write().await;
        let mut network_map = stored;
        for network in defaults {
            network_map.entry(network.key.clone()).or_insert(network);
        }
        info!(networks = network_map.len(), "background state initialised");
        maps.network_map = network_map;
        maps.evm_tokens = evm_tokens;
        maps.current_account = current.map(|c| c.address);
        Ok(())
    }

    /// Flushes every pending debounced write and broadcast.
    pub async fn shutdown(&self) {
        info!(
            pending = self.inner.debounce.pending_keys().len(),
            "shutting down background state"
        );
        self.inner.debounce.flush().await;
    }

    pub fn config(&self) -> &BackgroundConfig {
        &self.inner.config
    }

    pub fn keyring(&self) -> &dyn KeyringPort {
        self.inner.deps.keyring.as_ref()
    }

    pub fn chains(&self) -> &Arc<dyn ChainRegistryPort> {
        &self.inner.deps.chains
    }

    pub fn fee_policy(&self) -> &dyn FeePolicy {
        self.inner.deps.fee_policy.as_ref()
    }

    pub fn walletconnect(&self) -> &dyn WalletConnectPort {
        self.inner.deps.walletconnect.as_ref()
    }

    pub(crate) fn stores(&self) -> &StoreSet {
        &self.inner.deps.stores
    }

    pub(crate) fn now(&self) -> TimestampMs {
        match self.inner.deps.clock.now_ms() {
            Ok(ms) => TimestampMs(ms),
            Err(e) => {
                warn!("clock unavailable, stamping 0: {e}");
                TimestampMs(0)
            }
        }
    }

    pub fn get_chain_state_by_key(&self, key: &str) -> Option<ChainState> {
        self.inner.deps.chains.chain_state(key)
    }

    pub fn get_chain_info(&self, key: &str) -> Option<ChainInfo> {
        self.inner.deps.chains.chain_info(key)
    }

    /// Picks the chain a dApp request should target: the origin's remembered chain, then the
    /// first active chain of the access type, then (when `auto_active`) any chain of that type.
    pub fn get_dapp_chain_info(&self, query: ChainDiscovery<'_>) -> Option<ChainInfo> {
        let candidates: Vec<ChainInfo> = self
            .inner
            .deps
            .chains
            .chains()
            .into_iter()
            .filter(|c| c.access_type == query.access_type)
            .collect();

        if let Some(default) = query.default_chain {
            if let Some(chain) = candidates.iter().find(|c| c.slug == default) {
                return Some(chain.clone());
            }
        }

        let active = candidates.iter().find(|c| {
            self.get_chain_state_by_key(&c.slug)
                .map(|s| s.active)
                .unwrap_or(false)
        });
        if let Some(chain) = active {
            return Some(chain.clone());
        }

        if query.auto_active {
            return candidates.into_iter().next();
        }
        warn!(url = query.url, "no chain available for dApp request");
        None
    }

    pub async fn current_account(&self) -> Option<String> {
        self.inner.maps.read().await.current_account.clone()
    }

    /// Schedules `job` on the debounce channel `key`. The job gets a fresh handle when it runs and
    /// is skipped if the state has been dropped meanwhile.
    fn lazy_next<F, Fut>(&self, key: &'static str, job: F)
    where
        F: FnOnce(BackgroundState) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        self.inner.debounce.schedule(key, async move {
            if let Some(inner) = weak.upgrade() {
                job(BackgroundState { inner }).await;
            }
        });
    }

    fn lock_auth(&self) -> Result<MutexGuard<'_, auth::AuthRequests>, ValidationError> {
        self.inner
            .auth
            .lock()
            .map_err(|e| PortError::Transport(format!("auth lock poisoned: {e}")).into())
    }
}

pub(crate) const NETWORK_MAP_KEY: &str = "NetworkMap";
pub(crate) const EVM_TOKEN_KEY: &str = "EvmToken";
pub(crate) const CURRENT_ACCOUNT_KEY: &str = "CurrentAccountInfo";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct CurrentAccountInfo {
    pub address: String,
}

pub(crate) async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, PortError> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| PortError::Validation(format!("stored value for {key} is malformed: {e}"))),
        None => Ok(None),
    }
}

pub(crate) async fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), PortError> {
    let value = serde_json::to_value(value)
        .map_err(|e| PortError::Validation(format!("serialize {key} failed: {e}")))?;
    store.set(key, value).await
}
