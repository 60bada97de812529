#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dapp_gate_adapters::{
    ChainRegistryAdapter, InMemoryKeyring, MemoryStore, NetworkFeePolicy, WalletConnectAdapter,
};
use dapp_gate_core::domain::{
    AccessType, AuthUrlInfo, ChainInfo, GasFeeParams, TransactionConfig,
};
use dapp_gate_core::ports::{ClockPort, EvmApi, FeePolicy, KeyValueStore};
use dapp_gate_core::{
    AuthUrls, BackgroundConfig, BackgroundDeps, BackgroundState, PortError, StoreSet,
};

pub const ALICE: &str = "0x1000000000000000000000000000000000000001";
pub const BOB: &str = "0x2000000000000000000000000000000000000002";
pub const LEDGER: &str = "0x3000000000000000000000000000000000000003";
pub const DAPP_URL: &str = "https://app.example.org/swap";
pub const DAPP_ORIGIN: &str = "app.example.org";

#[derive(Debug, Default)]
pub struct TestClock {
    now: AtomicU64,
}

impl ClockPort for TestClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.fetch_add(1, Ordering::SeqCst) + 1_739_750_400_000)
    }
}

/// How a scripted `eth_estimateGas` call behaves.
#[derive(Debug, Clone)]
pub enum GasScript {
    After(Duration, u64),
    FailAfter(Duration, String),
}

/// `EvmApi` double with canned answers and call counters.
#[derive(Debug)]
pub struct ScriptedEvmApi {
    pub gas: Mutex<GasScript>,
    pub balance: Mutex<U256>,
    pub nonce: Mutex<Result<u64, String>>,
    pub code: String,
    pub gas_price: U256,
    pub priority_fee: U256,
    pub base_fee: Option<U256>,
    pub estimate_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub cancelled: AtomicUsize,
}

impl Default for ScriptedEvmApi {
    fn default() -> Self {
        Self {
            gas: Mutex::new(GasScript::After(Duration::ZERO, 21_000)),
            balance: Mutex::new(U256::from(10u64).pow(U256::from(18u64))),
            nonce: Mutex::new(Ok(7)),
            code: "0x".to_owned(),
            gas_price: U256::from(1_000_000_000u64),
            priority_fee: U256::from(1_000_000_000u64),
            base_fee: None,
            estimate_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }
}

impl ScriptedEvmApi {
    pub fn with_gas(script: GasScript) -> Self {
        Self {
            gas: Mutex::new(script),
            ..Self::default()
        }
    }

    pub fn set_balance(&self, balance: U256) {
        *self.balance.lock().expect("balance lock") = balance;
    }
}

#[async_trait]
impl EvmApi for ScriptedEvmApi {
    async fn estimate_gas(
        &self,
        _tx: &TransactionConfig,
        cancel: &CancellationToken,
    ) -> Result<U256, PortError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.gas.lock().expect("gas lock").clone();
        let (delay, outcome) = match script {
            GasScript::After(delay, gas) => (delay, Ok(U256::from(gas))),
            GasScript::FailAfter(delay, msg) => (delay, Err(PortError::Transport(msg))),
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(PortError::Transport("cancelled".to_owned()))
            }
            _ = tokio::time::sleep(delay) => outcome,
        }
    }

    async fn get_balance(&self, _address: &str) -> Result<U256, PortError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.balance.lock().expect("balance lock"))
    }

    async fn get_transaction_count(&self, _address: &str) -> Result<u64, PortError> {
        self.nonce
            .lock()
            .expect("nonce lock")
            .clone()
            .map_err(PortError::Transport)
    }

    async fn get_code(&self, _address: &str) -> Result<String, PortError> {
        Ok(self.code.clone())
    }

    async fn gas_price(&self) -> Result<U256, PortError> {
        Ok(self.gas_price)
    }

    async fn max_priority_fee_per_gas(&self) -> Result<U256, PortError> {
        Ok(self.priority_fee)
    }

    async fn latest_base_fee(&self) -> Result<Option<U256>, PortError> {
        Ok(self.base_fee)
    }
}

/// Fee policy that counts how often it is consulted.
#[derive(Debug, Default)]
pub struct CountingFeePolicy {
    pub inner: NetworkFeePolicy,
    pub calls: AtomicUsize,
}

#[async_trait]
impl FeePolicy for CountingFeePolicy {
    async fn calculate_gas_fee_params(
        &self,
        api: &dyn EvmApi,
        chain_key: &str,
    ) -> Result<GasFeeParams, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.calculate_gas_fee_params(api, chain_key).await
    }
}

pub struct Stores {
    pub authorize: MemoryStore,
    pub balance: MemoryStore,
    pub staking: MemoryStore,
    pub crowdloan: MemoryStore,
    pub nft: MemoryStore,
    pub nft_collection: MemoryStore,
    pub network_map: MemoryStore,
    pub evm_token: MemoryStore,
    pub history: MemoryStore,
    pub settings: MemoryStore,
}

impl Stores {
    fn new() -> Self {
        Self {
            authorize: MemoryStore::new(),
            balance: MemoryStore::new(),
            staking: MemoryStore::new(),
            crowdloan: MemoryStore::new(),
            nft: MemoryStore::new(),
            nft_collection: MemoryStore::new(),
            network_map: MemoryStore::new(),
            evm_token: MemoryStore::new(),
            history: MemoryStore::new(),
            settings: MemoryStore::new(),
        }
    }

    fn set(&self) -> StoreSet {
        let arc = |s: &MemoryStore| -> Arc<dyn KeyValueStore> { Arc::new(s.clone()) };
        StoreSet {
            authorize: arc(&self.authorize),
            balance: arc(&self.balance),
            staking: arc(&self.staking),
            crowdloan: arc(&self.crowdloan),
            nft: arc(&self.nft),
            nft_collection: arc(&self.nft_collection),
            network_map: arc(&self.network_map),
            evm_token: arc(&self.evm_token),
            history: arc(&self.history),
            settings: arc(&self.settings),
        }
    }
}

pub struct Harness {
    pub state: BackgroundState,
    pub keyring: InMemoryKeyring,
    pub chains: Arc<ChainRegistryAdapter>,
    pub walletconnect: WalletConnectAdapter,
    pub fees: Arc<CountingFeePolicy>,
    pub stores: Stores,
    /// Handle returned for the first connection to every EVM chain.
    pub api: Arc<ScriptedEvmApi>,
    /// Handle returned after `init_single_api`.
    pub fresh_api: Arc<ScriptedEvmApi>,
}

pub fn evm_chain(slug: &str, name: &str) -> ChainInfo {
    ChainInfo {
        slug: slug.to_owned(),
        name: name.to_owned(),
        access_type: AccessType::Evm,
        evm_chain_id: Some(1),
    }
}

pub fn harness() -> Harness {
    harness_with(ScriptedEvmApi::default(), ScriptedEvmApi::default())
}

/// Providers on this host fail to connect.
pub const UNREACHABLE_HOST: &str = "node.unreachable";

/// Chains: `ethereum` (active), `moonbeam` (inactive), `polkadot` (substrate, active).
/// Accounts: ALICE and BOB local, LEDGER external.
pub fn harness_with(api: ScriptedEvmApi, fresh_api: ScriptedEvmApi) -> Harness {
    let api = Arc::new(api);
    let fresh_api = Arc::new(fresh_api);
    let opened = Arc::new(AtomicUsize::new(0));

    let factory = {
        let api = api.clone();
        let fresh_api = fresh_api.clone();
        let opened = opened.clone();
        Arc::new(move |_slug: &str, url: &str| -> Result<Arc<dyn EvmApi>, PortError> {
            if url.ends_with(UNREACHABLE_HOST) {
                return Err(PortError::Transport(format!("cannot connect to {url}")));
            }
            // Every chain registered active opens once at setup; later opens are reconnects.
            let handle: Arc<dyn EvmApi> = if opened.fetch_add(1, Ordering::SeqCst) < 1 {
                api.clone()
            } else {
                fresh_api.clone()
            };
            Ok(handle)
        })
    };
    let chains = Arc::new(ChainRegistryAdapter::new(factory));
    chains
        .register(evm_chain("ethereum", "Ethereum"), "http://eth.invalid", true)
        .expect("register ethereum");
    chains
        .register(evm_chain("moonbeam", "Moonbeam"), "http://moonbeam.invalid", false)
        .expect("register moonbeam");
    chains
        .register(
            ChainInfo {
                slug: "polkadot".to_owned(),
                name: "Polkadot".to_owned(),
                access_type: AccessType::Substrate,
                evm_chain_id: None,
            },
            "wss://rpc.polkadot.invalid",
            true,
        )
        .expect("register polkadot");

    let keyring = InMemoryKeyring::default();
    keyring.add_evm_account(ALICE, "alice", false);
    keyring.add_evm_account(BOB, "bob", false);
    keyring.add_evm_account(LEDGER, "ledger", true);

    let walletconnect = WalletConnectAdapter::in_memory();
    let fees = Arc::new(CountingFeePolicy::default());
    let stores = Stores::new();

    let deps = BackgroundDeps {
        keyring: Arc::new(keyring.clone()),
        chains: chains.clone(),
        fee_policy: fees.clone(),
        walletconnect: Arc::new(walletconnect.clone()),
        clock: Arc::new(TestClock::default()),
        stores: stores.set(),
    };
    let state = BackgroundState::new(deps, BackgroundConfig::default());

    Harness {
        state,
        keyring,
        chains,
        walletconnect,
        fees,
        stores,
        api,
        fresh_api,
    }
}

pub fn auth_info(origin: &str, is_allowed: bool, allowed: &[&str]) -> AuthUrlInfo {
    AuthUrlInfo {
        count: 0,
        id: origin.to_owned(),
        is_allowed,
        is_allowed_map: [ALICE, BOB, LEDGER]
            .iter()
            .map(|a| ((*a).to_owned(), allowed.contains(a)))
            .collect(),
        origin: origin.to_owned(),
        url: format!("https://{origin}/"),
        current_evm_network_key: None,
        access_type: Some(AccessType::Evm),
    }
}

/// Stores an authorization record for [`DAPP_ORIGIN`].
pub async fn allow_dapp(state: &BackgroundState, allowed: &[&str]) {
    let mut urls = AuthUrls::new();
    urls.insert(DAPP_ORIGIN.to_owned(), auth_info(DAPP_ORIGIN, true, allowed));
    state.set_authorize(&urls).await.expect("store auth list");
}
