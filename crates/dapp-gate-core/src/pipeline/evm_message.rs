use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{PayloadValidated, ValidateStep, ValidatedPayload};
use crate::domain::{AccountJson, AccountMeta, EvmSignatureRequest};
use crate::errors::{TxErrorKind, ValidationError};
use crate::state::BackgroundState;

/// Signing methods a dApp may request.
pub const SUPPORTED_SIGN_METHODS: [&str; 6] = [
    "eth_sign",
    "personal_sign",
    "eth_signTypedData",
    "eth_signTypedData_v1",
    "eth_signTypedData_v3",
    "eth_signTypedData_v4",
];

const TYPED_DATA_JSON_METHODS: [&str; 2] = ["eth_signTypedData_v3", "eth_signTypedData_v4"];

/// Builds the [`EvmSignatureRequest`] shown to the user for a message-signing call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmSignMessageStep;

#[async_trait]
impl ValidateStep<BackgroundState> for EvmSignMessageStep {
    fn name(&self) -> &'static str {
        "evm-sign-message"
    }

    async fn validate(
        &self,
        state: &BackgroundState,
        _url: &str,
        payload: PayloadValidated,
        _topic: Option<&str>,
    ) -> Result<PayloadValidated, ValidationError> {
        let raw = match &payload.payload_after_validated {
            ValidatedPayload::RawMessage(raw) => raw.clone(),
            _ => String::new(),
        };
        let mut errors = payload.errors.clone();

        if payload.address.is_empty() || raw.is_empty() {
            errors.record(TxErrorKind::InvalidParams, "Not found address or payload to sign");
        }

        let account = match payload
            .pair
            .clone()
            .or_else(|| state.keyring().get_pair(&payload.address))
        {
            Some(pair) => AccountJson::from(&pair),
            None => AccountJson {
                address: payload.address.clone(),
                meta: AccountMeta::default(),
            },
        };

        let mut message = Value::String(raw.clone());
        let mut hash_payload = String::new();
        let mut can_sign = false;

        match payload.method.as_deref() {
            None => errors.record(TxErrorKind::UnsupportedMethod, "Unsupported method"),
            Some(method) if !SUPPORTED_SIGN_METHODS.contains(&method) => {
                errors.record(TxErrorKind::UnsupportedMethod, "Unsupported action")
            }
            Some(method) => {
                if TYPED_DATA_JSON_METHODS.contains(&method) {
                    message = serde_json::from_str::<Value>(&raw).map_err(|e| {
                        warn!(method, "typed data rejected: {e}");
                        ValidationError::InvalidTypedData(e.to_string())
                    })?;
                }
                if method == "personal_sign" {
                    can_sign = true;
                    hash_payload = raw;
                } else {
                    can_sign = !account.meta.is_external;
                }
            }
        }

        debug!(
            method = payload.method.as_deref().unwrap_or_default(),
            can_sign, "signature request prepared"
        );
        let request = EvmSignatureRequest {
            account,
            sign_type: payload.method.clone().unwrap_or_default(),
            payload: message,
            hash_payload,
            can_sign,
            id: String::new(),
        };
        Ok(PayloadValidated {
            errors,
            payload_after_validated: ValidatedPayload::SignatureRequest(request),
            ..payload
        })
    }
}
