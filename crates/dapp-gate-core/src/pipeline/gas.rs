//! Gas estimation with a soft timeout and one reconnect-and-retry.
//!
//! The first attempt is spawned and keeps running after the timeout fires. When the timeout wins,
//! the chain connection is re-initialised and a second attempt starts; whichever attempt settles
//! first decides the outcome. The other attempt is detached and its [`CancellationToken`] is
//! cancelled, so a transport that honours the token can stop early. Transports that ignore it
//! finish in the background and their result is discarded.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::TransactionConfig;
use crate::errors::PortError;
use crate::ports::{ChainRegistryPort, EvmApi};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GasEstimate {
    Estimated(U256),
    /// The winning attempt failed; carries the RPC error message.
    EstimateFailed(String),
    /// Re-initialising the connection failed before a retry could start.
    RecoveryFailed(String),
}

fn spawn_estimate(
    api: Arc<dyn EvmApi>,
    tx: TransactionConfig,
    cancel: CancellationToken,
) -> JoinHandle<Result<U256, PortError>> {
    tokio::spawn(async move { api.estimate_gas(&tx, &cancel).await })
}

fn settle(joined: Result<Result<U256, PortError>, tokio::task::JoinError>) -> GasEstimate {
    match joined {
        Ok(Ok(gas)) => GasEstimate::Estimated(gas),
        Ok(Err(e)) => GasEstimate::EstimateFailed(e.to_string()),
        Err(e) => GasEstimate::EstimateFailed(format!("gas estimation task failed: {e}")),
    }
}

pub(crate) async fn estimate_gas_with_recovery(
    chains: Arc<dyn ChainRegistryPort>,
    api: Arc<dyn EvmApi>,
    network_key: &str,
    tx: &TransactionConfig,
    timeout: Duration,
) -> GasEstimate {
    let first_cancel = CancellationToken::new();
    let retry_cancel = CancellationToken::new();
    let mut first = spawn_estimate(api.clone(), tx.clone(), first_cancel.clone());

    let recovery = {
        let retry_cancel = retry_cancel.clone();
        let network_key = network_key.to_owned();
        let tx = tx.clone();
        async move {
            tokio::time::sleep(timeout).await;
            warn!(network_key = %network_key, ?timeout, "gas estimation slow, re-initialising api");
            // Spawned so a late first attempt can win without tearing down the reconnect midway.
            let retry: JoinHandle<Result<GasEstimate, PortError>> = tokio::spawn(async move {
                chains.init_single_api(&network_key).await?;
                let fresh = chains.evm_api(&network_key).unwrap_or(api);
                Ok(settle(Ok(fresh.estimate_gas(&tx, &retry_cancel).await)))
            });
            match retry.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => GasEstimate::RecoveryFailed(e.to_string()),
                Err(e) => GasEstimate::RecoveryFailed(format!("api re-initialisation failed: {e}")),
            }
        }
    };

    tokio::select! {
        joined = &mut first => {
            debug!(network_key, "first gas estimate settled");
            retry_cancel.cancel();
            settle(joined)
        }
        outcome = recovery => {
            debug!(network_key, "gas estimate settled after re-initialisation");
            first_cancel.cancel();
            outcome
        }
    }
}
