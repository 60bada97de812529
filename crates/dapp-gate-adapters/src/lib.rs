pub mod abi;
pub mod chains;
pub mod clock;
pub mod config;
pub mod evm_rpc;
pub mod fees;
pub mod keyring;
pub mod store;
pub mod wc;

use std::sync::Arc;

use dapp_gate_core::ports::KeyValueStore;
use dapp_gate_core::{BackgroundDeps, BackgroundState, StoreSet};

pub use abi::{EvmCalldataParser, ParsedCalldata, TokenStandard};
pub use chains::{ChainRegistryAdapter, EvmApiFactory};
pub use clock::SystemClockAdapter;
pub use config::{AdapterConfig, ConfigError};
pub use evm_rpc::JsonRpcEvmApi;
pub use fees::NetworkFeePolicy;
pub use keyring::InMemoryKeyring;
pub use store::{JsonFileStore, MemoryStore};
pub use wc::WalletConnectAdapter;

/// File-backed stores under `store_dir` when configured, in-memory stores otherwise.
pub fn open_stores(config: &AdapterConfig) -> StoreSet {
    match &config.store_dir {
        Some(dir) => StoreSet::from_fn(|name| {
            let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(dir, name));
            store
        }),
        None => StoreSet::from_fn(|_| {
            let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
            store
        }),
    }
}

/// Wires the default adapters into a [`BackgroundState`].
pub fn build_background_state(
    config: &AdapterConfig,
    keyring: InMemoryKeyring,
    chains: Arc<ChainRegistryAdapter>,
    walletconnect: WalletConnectAdapter,
) -> BackgroundState {
    let deps = BackgroundDeps {
        keyring: Arc::new(keyring),
        chains,
        fee_policy: Arc::new(NetworkFeePolicy {
            base_fee_multiplier: config.base_fee_multiplier,
        }),
        walletconnect: Arc::new(walletconnect),
        clock: Arc::new(SystemClockAdapter),
        stores: open_stores(config),
    };
    BackgroundState::new(deps, config.background_config())
}
