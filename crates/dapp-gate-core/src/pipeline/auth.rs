use async_trait::async_trait;

use super::{PayloadValidated, ValidateStep};
use crate::errors::ValidationError;
use crate::state::BackgroundState;
use crate::utils::strip_url;

/// Resolves the signing keypair and checks that the origin has opted the account in.
/// Read-only; performs no chain I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthStep;

#[async_trait]
impl ValidateStep<BackgroundState> for AuthStep {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn validate(
        &self,
        state: &BackgroundState,
        url: &str,
        mut payload: PayloadValidated,
        _topic: Option<&str>,
    ) -> Result<PayloadValidated, ValidationError> {
        if payload.address.is_empty() {
            return Err(ValidationError::AddressMissing);
        }
        let pair = state
            .keyring()
            .get_pair(&payload.address)
            .ok_or(ValidationError::AccountNotFound)?;

        let auth_list = state.get_auth_list().await?;
        let auth_info = auth_list
            .get(&strip_url(url)?)
            .filter(|info| info.allows(&pair.address))
            .cloned()
            .ok_or_else(|| ValidationError::NotInAllowedList(payload.address.clone()))?;

        payload.auth_info = Some(auth_info);
        payload.pair = Some(pair);
        Ok(payload)
    }
}
