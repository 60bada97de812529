use async_trait::async_trait;

use super::{PayloadValidated, ValidateStep};
use crate::errors::{SdkError, ValidationError};
use crate::state::BackgroundState;
use crate::utils::{is_ethereum_address, is_same_address};

/// Checks a request relayed over WalletConnect against the accounts its session exposes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletConnectAuthStep;

/// `eip155:1:0xabc` -> `0xabc`. Malformed entries are skipped.
fn caip10_address(account: &str) -> Option<&str> {
    account.split(':').nth(2)
}

#[async_trait]
impl ValidateStep<BackgroundState> for WalletConnectAuthStep {
    fn name(&self) -> &'static str {
        "walletconnect-auth"
    }

    async fn validate(
        &self,
        state: &BackgroundState,
        _url: &str,
        mut payload: PayloadValidated,
        topic: Option<&str>,
    ) -> Result<PayloadValidated, ValidationError> {
        let unauthorized = || ValidationError::sdk(SdkError::UnauthorizedExtendRequest, "");
        let topic = topic.filter(|t| !t.is_empty()).ok_or_else(unauthorized)?;
        let session = state
            .walletconnect()
            .get_session(topic)
            .ok_or_else(unauthorized)?;

        let address = payload.address.clone();
        let unsupported = || ValidationError::sdk(SdkError::UnsupportedAccounts, format!(" {address}"));
        if address.is_empty() {
            return Err(unsupported());
        }

        let namespace = if is_ethereum_address(&address) {
            session.namespaces.eip155.as_ref()
        } else {
            session.namespaces.polkadot.as_ref()
        };
        let session_accounts: Vec<&str> = namespace
            .map(|ns| ns.accounts.iter().filter_map(|a| caip10_address(a)).collect())
            .unwrap_or_default();

        let pair = state
            .keyring()
            .get_pair(&address)
            .ok_or(ValidationError::AccountNotFound)?;

        if !session_accounts
            .iter()
            .any(|account| is_same_address(account, &address))
        {
            return Err(unsupported());
        }

        payload.pair = Some(pair);
        Ok(payload)
    }
}
