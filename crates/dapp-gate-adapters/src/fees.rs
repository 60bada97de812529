use async_trait::async_trait;
use alloy::primitives::U256;
use tracing::debug;

use dapp_gate_core::domain::GasFeeParams;
use dapp_gate_core::ports::{EvmApi, FeePolicy};
use dapp_gate_core::PortError;

/// Quotes fees from the chain itself.
///
/// Chains reporting a base fee get EIP-1559 parameters with
/// `max_fee = base_fee * base_fee_multiplier + priority`; others get the node's legacy gas price.
#[derive(Debug, Clone)]
pub struct NetworkFeePolicy {
    pub base_fee_multiplier: u64,
}

impl Default for NetworkFeePolicy {
    fn default() -> Self {
        Self {
            base_fee_multiplier: 2,
        }
    }
}

#[async_trait]
impl FeePolicy for NetworkFeePolicy {
    async fn calculate_gas_fee_params(
        &self,
        api: &dyn EvmApi,
        chain_key: &str,
    ) -> Result<GasFeeParams, PortError> {
        let (base_fee, gas_price) = tokio::join!(api.latest_base_fee(), api.gas_price());
        let gas_price = gas_price?;

        let Some(base_fee) = base_fee? else {
            debug!(chain_key, %gas_price, "legacy fee quote");
            return Ok(GasFeeParams {
                base_gas_fee: None,
                max_priority_fee_per_gas: U256::ZERO,
                max_fee_per_gas: U256::ZERO,
                gas_price,
            });
        };

        // Some nodes do not implement eth_maxPriorityFeePerGas; derive it from the gas price.
        let priority = match api.max_priority_fee_per_gas().await {
            Ok(priority) => priority,
            Err(_) => gas_price.saturating_sub(base_fee),
        };
        let max_fee = base_fee
            .saturating_mul(U256::from(self.base_fee_multiplier))
            .saturating_add(priority);
        debug!(chain_key, %base_fee, %priority, %max_fee, "eip-1559 fee quote");
        Ok(GasFeeParams {
            base_gas_fee: Some(base_fee),
            max_priority_fee_per_gas: priority,
            max_fee_per_gas: max_fee,
            gas_price,
        })
    }
}
