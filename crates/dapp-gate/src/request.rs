//! Request file format and dispatch into the validation pipeline.

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::warn;

use dapp_gate_adapters::abi::is_contract;
use dapp_gate_adapters::{EvmCalldataParser, InMemoryKeyring, ParsedCalldata, WalletConnectAdapter};
use dapp_gate_core::domain::{AccessType, AuthUrlInfo, WcNamespace, WcNamespaces, WcSession};
use dapp_gate_core::utils::strip_url;
use dapp_gate_core::{
    AuthUrls, BackgroundState, EvmSendTransactionParams, PayloadValidated, ValidationError,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntry {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Hardware, QR or watch-only account.
    #[serde(default)]
    pub external: bool,
}

/// WalletConnect session the request arrives through. `accounts` are CAIP-10 ids.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionEntry {
    pub topic: String,
    pub accounts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DappCall {
    Transaction {
        transaction: EvmSendTransactionParams,
    },
    Message {
        method: String,
        address: String,
        message: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFile {
    pub url: String,
    #[serde(default)]
    pub network_key: Option<String>,
    pub accounts: Vec<AccountEntry>,
    /// Accounts the site was already granted. Empty means the site is not connected.
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub session: Option<SessionEntry>,
    pub call: DappCall,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub validated: PayloadValidated,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calldata: Option<ParsedCalldata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_is_contract: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    Validated(Report),
    Rejected {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<i64>,
    },
}

pub fn keyring(accounts: &[AccountEntry]) -> InMemoryKeyring {
    let keyring = InMemoryKeyring::default();
    for account in accounts {
        let name = account.name.as_deref().unwrap_or(&account.address);
        keyring.add_evm_account(&account.address, name, account.external);
    }
    keyring
}

fn auth_record(file: &RequestFile) -> Result<AuthUrlInfo> {
    let id = strip_url(&file.url)?;
    Ok(AuthUrlInfo {
        count: 0,
        id: id.clone(),
        is_allowed: true,
        is_allowed_map: file
            .accounts
            .iter()
            .map(|a| (a.address.clone(), file.allowed.contains(&a.address)))
            .collect(),
        origin: id,
        url: file.url.clone(),
        current_evm_network_key: file.network_key.clone(),
        access_type: Some(AccessType::Evm),
    })
}

/// Seeds the site authorization and WalletConnect session described by `file`, then validates
/// its call.
pub async fn run(
    state: &BackgroundState,
    walletconnect: &WalletConnectAdapter,
    file: RequestFile,
) -> Result<Outcome> {
    if !file.allowed.is_empty() {
        let mut urls = AuthUrls::new();
        let record = auth_record(&file)?;
        urls.insert(record.id.clone(), record);
        state.set_authorize(&urls).await?;
    }
    if let Some(session) = &file.session {
        walletconnect.insert_session(WcSession {
            topic: session.topic.clone(),
            namespaces: WcNamespaces {
                eip155: Some(WcNamespace {
                    accounts: session.accounts.clone(),
                    ..WcNamespace::default()
                }),
                polkadot: None,
            },
            peer_url: Some(file.url.clone()),
        })?;
    }

    let validated = match (&file.session, file.call) {
        (Some(session), DappCall::Transaction { transaction }) => {
            let network_key = file
                .network_key
                .as_deref()
                .ok_or_else(|| eyre::eyre!("networkKey is required for WalletConnect transactions"))?;
            state
                .validate_walletconnect_transaction(&session.topic, network_key, transaction)
                .await
        }
        (Some(session), DappCall::Message { method, address, message }) => {
            state
                .validate_walletconnect_message(&session.topic, &address, &method, &message)
                .await
        }
        (None, DappCall::Transaction { transaction }) => {
            state
                .validate_evm_transaction(&file.url, file.network_key.clone(), transaction)
                .await
        }
        (None, DappCall::Message { method, address, message }) => {
            state
                .validate_evm_message(&file.url, &address, &method, &message)
                .await
        }
    };

    match validated {
        Ok(validated) => Ok(Outcome::Validated(inspect(state, validated).await?)),
        Err(e) => Ok(rejected(e)),
    }
}

fn rejected(e: ValidationError) -> Outcome {
    Outcome::Rejected {
        message: e.to_string(),
        code: e.code(),
    }
}

/// Decodes token calldata and checks whether the recipient is a contract.
async fn inspect(state: &BackgroundState, validated: PayloadValidated) -> Result<Report> {
    let Some(tx) = validated.prepared_transaction() else {
        return Ok(Report {
            validated,
            calldata: None,
            to_is_contract: None,
        });
    };

    let parser = EvmCalldataParser::new().wrap_err("failed to load token ABIs")?;
    let calldata = match tx.transaction.data.as_deref() {
        Some(data) => parser.parse(data).unwrap_or_else(|e| {
            warn!("calldata not decoded: {e}");
            None
        }),
        None => None,
    };

    let api = validated
        .network_key
        .as_deref()
        .and_then(|key| state.chains().evm_api(key));
    let to_is_contract = match (api, tx.transaction.to.as_deref()) {
        (Some(api), Some(to)) => match is_contract(api.as_ref(), to).await {
            Ok(found) => Some(found),
            Err(e) => {
                warn!(to, "code lookup failed: {e}");
                None
            }
        },
        _ => None,
    };

    Ok(Report {
        validated,
        calldata,
        to_is_contract,
    })
}
