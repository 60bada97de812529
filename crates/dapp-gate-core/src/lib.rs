pub mod balance;
pub mod config;
pub mod debounce;
pub mod domain;
pub mod errors;
pub mod pipeline;
pub mod ports;
pub mod state;
pub mod state_machine;
pub mod utils;

pub use config::BackgroundConfig;
pub use domain::{AuthUrlInfo, AuthUrls, EvmSendTransactionParams, KeyringPair, TimestampMs};
pub use errors::{SdkError, TransactionError, TxErrorKind, ValidationError};
pub use pipeline::{generate_validation_process, Findings, PayloadValidated, ValidateStep, ValidatedPayload};
pub use ports::{ChainRegistryPort, EvmApi, FeePolicy, KeyValueStore, KeyringPort, PortError};
pub use state::{BackgroundDeps, BackgroundState, StoreSet};
pub use state_machine::{auth_transition, AuthAction, AuthStatus, StateTransition};
