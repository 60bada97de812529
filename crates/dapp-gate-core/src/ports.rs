use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use crate::errors::PortError;
use crate::domain::{
    ChainInfo, ChainState, GasFeeParams, KeyringPair, NetworkJson, TransactionConfig, WcSession,
};

pub trait KeyringPort: Send + Sync {
    fn get_pair(&self, address: &str) -> Option<KeyringPair>;
    fn accounts(&self) -> Vec<KeyringPair>;
}

/// Live JSON-RPC handle for one EVM chain.
#[async_trait]
pub trait EvmApi: Send + Sync {
    /// `cancel` is triggered once the caller has stopped waiting for the result. Transports that
    /// cannot abort an in-flight call may ignore it.
    async fn estimate_gas(
        &self,
        tx: &TransactionConfig,
        cancel: &CancellationToken,
    ) -> Result<U256, PortError>;
    async fn get_balance(&self, address: &str) -> Result<U256, PortError>;
    async fn get_transaction_count(&self, address: &str) -> Result<u64, PortError>;
    async fn get_code(&self, address: &str) -> Result<String, PortError>;
    async fn gas_price(&self) -> Result<U256, PortError>;
    async fn max_priority_fee_per_gas(&self) -> Result<U256, PortError>;
    /// `None` on chains without EIP-1559 support.
    async fn latest_base_fee(&self) -> Result<Option<U256>, PortError>;
}

#[async_trait]
pub trait ChainRegistryPort: Send + Sync {
    fn chains(&self) -> Vec<ChainInfo>;
    fn chain_info(&self, key: &str) -> Option<ChainInfo>;
    fn chain_state(&self, key: &str) -> Option<ChainState>;
    fn evm_api(&self, key: &str) -> Option<Arc<dyn EvmApi>>;
    async fn enable_chain(&self, key: &str) -> Result<bool, PortError>;
    async fn disable_chain(&self, key: &str) -> Result<bool, PortError>;
    /// Drops the current connection for `key` and opens a fresh one.
    async fn init_single_api(&self, key: &str) -> Result<(), PortError>;
    /// Applies an edited chain configuration (provider change, new custom chain).
    async fn update_chain(&self, network: &NetworkJson) -> Result<(), PortError>;
}

#[async_trait]
pub trait FeePolicy: Send + Sync {
    async fn calculate_gas_fee_params(
        &self,
        api: &dyn EvmApi,
        chain_key: &str,
    ) -> Result<GasFeeParams, PortError>;
}

/// Persisted key-value store backing one domain map.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, PortError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), PortError>;
    async fn remove(&self, key: &str) -> Result<(), PortError>;
}

pub trait WalletConnectPort: Send + Sync {
    fn get_session(&self, topic: &str) -> Option<WcSession>;
}

pub trait ClockPort: Send + Sync {
    fn now_ms(&self) -> Result<u64, PortError>;
}
