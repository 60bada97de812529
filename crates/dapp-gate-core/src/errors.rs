use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a port implementation (stores, chain connections, keyring).
#[derive(Debug, Clone, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("policy error: {0}")]
    Policy(String),
}

/// Canonical WalletConnect SDK errors surfaced to dApps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdkError {
    UserRejected,
    UnauthorizedExtendRequest,
    UnsupportedAccounts,
}

impl SdkError {
    pub fn code(self) -> i64 {
        match self {
            SdkError::UserRejected => 5000,
            SdkError::UnauthorizedExtendRequest => 3004,
            SdkError::UnsupportedAccounts => 5103,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            SdkError::UserRejected => "User rejected.",
            SdkError::UnauthorizedExtendRequest => "Unauthorized extend request.",
            SdkError::UnsupportedAccounts => "Unsupported accounts.",
        }
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Fatal precondition failure. Aborts the validation pipeline and rejects the dApp call.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Not found address to sign")]
    AddressMissing,
    #[error("Unable to find account")]
    AccountNotFound,
    #[error("Account {0} not in allowed list")]
    NotInAllowedList(String),
    #[error("No network to connect")]
    NoNetwork,
    #[error("{kind}{detail}")]
    Sdk { kind: SdkError, detail: String },
    #[error("The source {0} has a pending authorization request")]
    PendingAuthorization(String),
    #[error("The source {0} is not allowed to interact with this extension")]
    SiteNotAllowed(String),
    #[error("The source {0} has not been enabled yet")]
    SiteNotEnabled(String),
    #[error("Invalid url {0}, expected to start with http: or https: or ipfs: or ipns:")]
    InvalidUrl(String),
    #[error("authorization request not found: {0}")]
    AuthRequestNotFound(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Typed data payload is not valid JSON: {0}")]
    InvalidTypedData(String),
    #[error(transparent)]
    Port(#[from] PortError),
}

impl ValidationError {
    pub fn sdk(kind: SdkError, detail: impl Into<String>) -> Self {
        ValidationError::Sdk {
            kind,
            detail: detail.into(),
        }
    }

    /// Canonical wallet-protocol code, when the error maps onto one.
    pub fn code(&self) -> Option<i64> {
        match self {
            ValidationError::Sdk { kind, .. } => Some(kind.code()),
            ValidationError::Rejected(_) => Some(SdkError::UserRejected.code()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxErrorKind {
    InvalidParams,
    InternalError,
    NotEnoughBalance,
    UnsupportedMethod,
}

impl TxErrorKind {
    fn default_message(self) -> &'static str {
        match self {
            TxErrorKind::InvalidParams => "Invalid params",
            TxErrorKind::InternalError => "Internal error",
            TxErrorKind::NotEnoughBalance => "Insufficient balance",
            TxErrorKind::UnsupportedMethod => "Unsupported method",
        }
    }
}

/// Non-fatal finding recorded while preparing a request for signing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct TransactionError {
    pub kind: TxErrorKind,
    pub message: String,
}

impl TransactionError {
    pub fn new(kind: TxErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            kind.default_message().to_owned()
        } else {
            message
        };
        Self { kind, message }
    }

    pub fn of_kind(kind: TxErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdk_error_message_is_prefix_of_detail() {
        let err = ValidationError::sdk(SdkError::UnsupportedAccounts, " 0xabc");
        assert_eq!(err.to_string(), "Unsupported accounts. 0xabc");
        assert_eq!(err.code(), Some(5103));
    }

    #[test]
    fn empty_message_falls_back_to_kind_default() {
        let err = TransactionError::new(TxErrorKind::InternalError, "");
        assert_eq!(err.message, "Internal error");
    }
}
