use async_trait::async_trait;
use tracing::{info, warn};

use super::{PayloadValidated, ValidateStep};
use crate::domain::AccessType;
use crate::errors::{SdkError, ValidationError};
use crate::state::{BackgroundState, ChainDiscovery};

/// Resolves the target chain when the request did not name one, and activates it on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectStep;

#[async_trait]
impl ValidateStep<BackgroundState> for ConnectStep {
    fn name(&self) -> &'static str {
        "connect"
    }

    async fn validate(
        &self,
        state: &BackgroundState,
        url: &str,
        payload: PayloadValidated,
        _topic: Option<&str>,
    ) -> Result<PayloadValidated, ValidationError> {
        let network_key = match payload.network_key.clone() {
            Some(key) => key,
            None => {
                let (default_chain, auto_active) = match (url.is_empty(), &payload.auth_info) {
                    (false, Some(info)) => (info.current_evm_network_key.as_deref(), info.is_allowed),
                    _ => (None, false),
                };
                state
                    .get_dapp_chain_info(ChainDiscovery {
                        auto_active,
                        access_type: AccessType::Evm,
                        default_chain,
                        url,
                    })
                    .map(|chain| chain.slug)
                    .ok_or(ValidationError::NoNetwork)?
            }
        };

        let active = state
            .get_chain_state_by_key(&network_key)
            .map(|s| s.active)
            .unwrap_or(false);
        if !active {
            let chain_name = state
                .get_chain_info(&network_key)
                .map(|c| c.name)
                .unwrap_or_else(|| network_key.clone());
            info!(network_key = %network_key, "activating chain for dApp request");
            if let Err(e) = state.chains().enable_chain(&network_key).await {
                warn!(network_key = %network_key, "chain activation failed: {e}");
                return Err(ValidationError::sdk(
                    SdkError::UserRejected,
                    format!(" Can not active chain: {chain_name}"),
                ));
            }
        }

        Ok(PayloadValidated {
            network_key: Some(network_key),
            ..payload
        })
    }
}
