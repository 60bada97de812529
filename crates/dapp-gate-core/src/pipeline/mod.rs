//! Request validation pipeline.
//!
//! A request from a website is threaded through an ordered list of [`ValidateStep`]s. Each step
//! takes the [`PayloadValidated`] context by value and returns the next one. Two failure channels
//! exist:
//!
//! - a step returns `Err(ValidationError)` for a fatal precondition; the pipeline stops and the
//!   dApp call is rejected;
//! - a data-preparation step pushes a [`TransactionError`] into [`PayloadValidated::errors`]; the
//!   pipeline keeps going so the user sees every problem at once.

mod auth;
mod connect;
mod evm_message;
mod evm_transaction;
mod gas;
mod walletconnect;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    AuthUrlInfo, EvmSendTransactionParams, EvmSignatureRequest, KeyringPair, TransactionValidate,
};
use crate::errors::{TransactionError, TxErrorKind, ValidationError};

pub use auth::AuthStep;
pub use connect::ConnectStep;
pub use evm_message::{EvmSignMessageStep, SUPPORTED_SIGN_METHODS};
pub use evm_transaction::EvmTransactionStep;
pub use walletconnect::WalletConnectAuthStep;

/// Step-specific payload. Input variants are replaced by output variants as steps run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum ValidatedPayload {
    #[default]
    Empty,
    TransactionParams(EvmSendTransactionParams),
    PreparedTransaction(TransactionValidate),
    RawMessage(String),
    SignatureRequest(EvmSignatureRequest),
}

/// Non-fatal findings accumulated while preparing a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Findings(Vec<TransactionError>);

impl Findings {
    pub fn push(&mut self, error: TransactionError) {
        self.0.push(error);
    }

    pub fn record(&mut self, kind: TxErrorKind, message: impl Into<String>) {
        self.push(TransactionError::new(kind, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains_kind(&self, kind: TxErrorKind) -> bool {
        self.0.iter().any(|e| e.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionError> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<TransactionError> {
        self.0
    }
}

impl Extend<TransactionError> for Findings {
    fn extend<T: IntoIterator<Item = TransactionError>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

/// Context threaded through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadValidated {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_key: Option<String>,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<KeyringPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<AuthUrlInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub payload_after_validated: ValidatedPayload,
    #[serde(default)]
    pub errors: Findings,
}

impl PayloadValidated {
    pub fn transaction(
        address: impl Into<String>,
        network_key: Option<String>,
        params: EvmSendTransactionParams,
    ) -> Self {
        Self {
            network_key,
            address: address.into(),
            payload_after_validated: ValidatedPayload::TransactionParams(params),
            ..Self::default()
        }
    }

    pub fn message(
        address: impl Into<String>,
        method: Option<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            method,
            payload_after_validated: ValidatedPayload::RawMessage(payload.into()),
            ..Self::default()
        }
    }

    pub fn prepared_transaction(&self) -> Option<&TransactionValidate> {
        match &self.payload_after_validated {
            ValidatedPayload::PreparedTransaction(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn signature_request(&self) -> Option<&EvmSignatureRequest> {
        match &self.payload_after_validated {
            ValidatedPayload::SignatureRequest(req) => Some(req),
            _ => None,
        }
    }
}

/// One middleware step. `S` is the binding context the step may reach into (chain registry,
/// keyring, authorization store).
#[async_trait]
pub trait ValidateStep<S: ?Sized + Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn validate(
        &self,
        state: &S,
        url: &str,
        payload: PayloadValidated,
        topic: Option<&str>,
    ) -> Result<PayloadValidated, ValidationError>;
}

/// Runs `steps` strictly in order, feeding each step the previous step's output.
pub async fn generate_validation_process<S: ?Sized + Sync>(
    state: &S,
    url: &str,
    payload: PayloadValidated,
    steps: &[&dyn ValidateStep<S>],
    topic: Option<&str>,
) -> Result<PayloadValidated, ValidationError> {
    let mut result = payload;
    for step in steps {
        debug!(step = step.name(), url, "running validation step");
        result = step.validate(state, url, result, topic).await.map_err(|e| {
            debug!(step = step.name(), error = %e, "validation step failed");
            e
        })?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<PayloadValidated>>,
    }

    struct Tag(&'static str);

    #[async_trait]
    impl ValidateStep<Recorder> for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn validate(
            &self,
            state: &Recorder,
            _url: &str,
            mut payload: PayloadValidated,
            _topic: Option<&str>,
        ) -> Result<PayloadValidated, ValidationError> {
            state.seen.lock().unwrap().push(payload.clone());
            payload.errors.record(TxErrorKind::InternalError, self.0);
            Ok(payload)
        }
    }

    struct Fail;

    #[async_trait]
    impl ValidateStep<Recorder> for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        async fn validate(
            &self,
            _state: &Recorder,
            _url: &str,
            _payload: PayloadValidated,
            _topic: Option<&str>,
        ) -> Result<PayloadValidated, ValidationError> {
            Err(ValidationError::NoNetwork)
        }
    }

    #[tokio::test]
    async fn each_step_receives_previous_output() {
        let recorder = Recorder::default();
        let (a, b, c) = (Tag("a"), Tag("b"), Tag("c"));
        let out = generate_validation_process(
            &recorder,
            "https://dapp.example",
            PayloadValidated::message("0x1", None, "hello"),
            &[&a, &b, &c],
            None,
        )
        .await
        .expect("pipeline ok");

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].errors.len(), 0);
        assert_eq!(seen[1].errors.len(), 1);
        assert_eq!(seen[2].errors.len(), 2);
        let messages: Vec<_> = out.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn fatal_error_stops_the_chain() {
        let recorder = Recorder::default();
        let (a, c) = (Tag("a"), Tag("c"));
        let err = generate_validation_process(
            &recorder,
            "https://dapp.example",
            PayloadValidated::default(),
            &[&a, &Fail, &c],
            None,
        )
        .await
        .expect_err("must fail");
        assert!(matches!(err, ValidationError::NoNetwork));
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }
}
