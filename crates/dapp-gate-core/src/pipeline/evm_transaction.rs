use alloy::primitives::U256;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::gas::{estimate_gas_with_recovery, GasEstimate};
use super::{Findings, PayloadValidated, ValidateStep, ValidatedPayload};
use crate::domain::{
    AccountJson, AccountMeta, EvmSendTransactionParams, TransactionConfig, TransactionValidate,
};
use crate::errors::{PortError, TxErrorKind, ValidationError};
use crate::ports::EvmApi;
use crate::state::BackgroundState;
use crate::utils::{auto_format_number, is_same_address, parse_quantity};

/// Turns dApp transaction parameters into a signable transaction. Every problem found along the
/// way is recorded in [`PayloadValidated::errors`]; only a missing input payload is fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmTransactionStep;

fn normalize(params: &EvmSendTransactionParams) -> TransactionConfig {
    TransactionConfig {
        from: params.from.clone(),
        to: params.to.clone(),
        value: auto_format_number(params.value.as_ref()),
        gas: auto_format_number(params.gas.as_ref()),
        gas_price: auto_format_number(params.gas_price.as_ref().or(params.gas_limit.as_ref())),
        max_priority_fee_per_gas: auto_format_number(params.max_priority_fee_per_gas.as_ref()),
        max_fee_per_gas: auto_format_number(params.max_fee_per_gas.as_ref()),
        data: params.data.clone(),
        nonce: None,
    }
}

fn quantity(value: Option<&str>) -> Option<U256> {
    value.filter(|v| !v.is_empty()).and_then(parse_quantity)
}

/// Records every numeric field that survived normalisation but is still not a wei quantity.
fn check_quantities(transaction: &TransactionConfig, errors: &mut Findings) {
    let fields = [
        ("value", &transaction.value),
        ("gas", &transaction.gas),
        ("gasPrice", &transaction.gas_price),
        ("maxFeePerGas", &transaction.max_fee_per_gas),
        ("maxPriorityFeePerGas", &transaction.max_priority_fee_per_gas),
    ];
    for (field, raw) in fields {
        let Some(raw) = raw.as_deref() else { continue };
        if parse_quantity(raw).is_none() {
            warn!(field, raw, "malformed numeric field");
            errors.record(TxErrorKind::InvalidParams, format!("Invalid {field}: {raw}"));
        }
    }
}

#[async_trait]
impl ValidateStep<BackgroundState> for EvmTransactionStep {
    fn name(&self) -> &'static str {
        "evm-transaction"
    }

    async fn validate(
        &self,
        state: &BackgroundState,
        _url: &str,
        payload: PayloadValidated,
        _topic: Option<&str>,
    ) -> Result<PayloadValidated, ValidationError> {
        let params = match &payload.payload_after_validated {
            ValidatedPayload::TransactionParams(params) => params.clone(),
            other => {
                return Err(PortError::Validation(format!(
                    "expected transaction params, got {other:?}"
                ))
                .into())
            }
        };
        let mut errors = payload.errors.clone();
        let network_key = payload.network_key.clone().unwrap_or_default();
        let from_address = payload.address.clone();
        let mut transaction = normalize(&params);
        check_quantities(&transaction, &mut errors);

        if transaction
            .to
            .as_deref()
            .is_some_and(|to| is_same_address(&transaction.from, to))
        {
            errors.record(
                TxErrorKind::InvalidParams,
                "Receiving address must be different from sending address",
            );
        }
        if from_address.is_empty() {
            errors.record(
                TxErrorKind::InvalidParams,
                "You have rescinded allowance for this account in wallet",
            );
        }

        let evm_api = state.chains().evm_api(&network_key);
        let mut estimate_gas = String::new();

        match &evm_api {
            None => {
                warn!(network_key = %network_key, "no evm api for chain");
                errors.record(
                    TxErrorKind::InternalError,
                    format!("No EVM connection for network {network_key}"),
                );
            }
            Some(api) => {
                if quantity(transaction.gas.as_deref()).is_none() {
                    let outcome = estimate_gas_with_recovery(
                        state.chains().clone(),
                        api.clone(),
                        &network_key,
                        &transaction,
                        state.config().gas_estimate_timeout,
                    )
                    .await;
                    match outcome {
                        GasEstimate::Estimated(gas) => transaction.gas = Some(gas.to_string()),
                        GasEstimate::EstimateFailed(msg) => {
                            warn!(network_key = %network_key, "gas estimation failed: {msg}");
                            errors.record(TxErrorKind::InvalidParams, msg);
                        }
                        GasEstimate::RecoveryFailed(msg) => {
                            warn!(network_key = %network_key, "gas recovery failed: {msg}");
                            errors.record(TxErrorKind::InternalError, msg);
                        }
                    }
                }

                match quantity(transaction.gas.as_deref()) {
                    None => {
                        errors.record(TxErrorKind::InternalError, "Unable to estimate gas");
                        let nonce = api.get_transaction_count(&transaction.from).await;
                        attach_nonce(network_key.as_str(), &mut transaction, nonce, &mut errors);
                    }
                    Some(gas) => {
                        estimate_gas = prepare_fees(
                            state,
                            api.as_ref(),
                            &network_key,
                            &params,
                            &mut transaction,
                            gas,
                            &mut errors,
                        )
                        .await;
                    }
                }
            }
        }

        let account = match payload
            .pair
            .clone()
            .or_else(|| state.keyring().get_pair(&from_address))
        {
            Some(pair) => AccountJson {
                address: from_address.clone(),
                meta: pair.meta,
            },
            None => AccountJson {
                address: from_address.clone(),
                meta: AccountMeta::default(),
            },
        };

        debug!(
            network_key = %network_key,
            findings = errors.len(),
            estimate_gas = %estimate_gas,
            "transaction prepared"
        );
        Ok(PayloadValidated {
            errors,
            payload_after_validated: ValidatedPayload::PreparedTransaction(TransactionValidate {
                transaction,
                estimate_gas,
                account,
            }),
            ..payload
        })
    }
}

/// Picks the fee model, then checks the balance and fetches the nonce. The fee quote, balance and
/// nonce do not depend on each other and are requested concurrently. Returns the fee upper bound
/// in wei, or an empty string when it could not be computed.
async fn prepare_fees(
    state: &BackgroundState,
    api: &dyn EvmApi,
    network_key: &str,
    params: &EvmSendTransactionParams,
    transaction: &mut TransactionConfig,
    gas: U256,
    errors: &mut Findings,
) -> String {
    let explicit_max_fee = match (&params.max_fee_per_gas, &params.max_priority_fee_per_gas) {
        (Some(_), Some(_)) => quantity(transaction.max_fee_per_gas.as_deref()),
        _ => None,
    };
    let explicit_gas_price =
        auto_format_number(params.gas_price.as_ref()).and_then(|p| quantity(Some(&p)));
    let needs_quote = explicit_max_fee.is_none() && explicit_gas_price.is_none();

    let quote = async {
        if needs_quote {
            Some(state.fee_policy().calculate_gas_fee_params(api, network_key).await)
        } else {
            None
        }
    };
    let (quote, balance, nonce) = tokio::join!(
        quote,
        api.get_balance(&transaction.from),
        api.get_transaction_count(&transaction.from)
    );

    let mut cost = None;
    if let Some(max_fee) = explicit_max_fee {
        cost = max_fee.checked_mul(gas);
    } else if let Some(price) = explicit_gas_price {
        cost = price.checked_mul(gas);
    } else {
        match quote {
            Some(Ok(fees)) if fees.base_gas_fee.is_some() => {
                transaction.max_priority_fee_per_gas = Some(fees.max_priority_fee_per_gas.to_string());
                transaction.max_fee_per_gas = Some(fees.max_fee_per_gas.to_string());
                cost = fees.max_fee_per_gas.checked_mul(gas);
            }
            Some(Ok(fees)) => {
                transaction.gas_price = Some(fees.gas_price.to_string());
                cost = fees.gas_price.checked_mul(gas);
            }
            Some(Err(e)) => {
                warn!(network_key, "fee quote failed: {e}");
                errors.record(TxErrorKind::InternalError, e.to_string());
            }
            None => {}
        }
    }

    match balance {
        Ok(balance) => match cost {
            None => errors.record(TxErrorKind::InternalError, "Can't calculate estimate gas fee"),
            Some(cost) => {
                // A malformed value is already an InvalidParams finding.
                let value = parse_quantity(transaction.value.as_deref().unwrap_or_default());
                if let Some(value) = value {
                    let covered = cost.checked_add(value).is_some_and(|needed| balance >= needed);
                    if !covered {
                        errors.record(TxErrorKind::NotEnoughBalance, "Insufficient balance");
                    }
                }
            }
        },
        Err(e) => {
            warn!(network_key, "balance fetch failed: {e}");
            errors.record(TxErrorKind::InternalError, e.to_string());
        }
    }

    attach_nonce(network_key, transaction, nonce, errors);
    cost.map(|c| c.to_string()).unwrap_or_default()
}

fn attach_nonce(
    network_key: &str,
    transaction: &mut TransactionConfig,
    nonce: Result<u64, PortError>,
    errors: &mut Findings,
) {
    match nonce {
        Ok(nonce) => transaction.nonce = Some(nonce),
        Err(e) => {
            warn!(network_key, "nonce fetch failed: {e}");
            errors.record(TxErrorKind::InternalError, e.to_string());
        }
    }
}
