//! Balance arithmetic for the `tokens` and `orml_tokens` Substrate pallets.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::utils::parse_quantity;

/// Raw `AccountData` as returned by the tokens pallets. Amounts are decimal or `0x` hex strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensAccountData {
    pub free: String,
    pub reserved: String,
    pub frozen: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceError {
    #[error("invalid {field} amount: {value}")]
    InvalidAmount { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtrinsicKind {
    TransferBalance,
    TransferToken,
    TransferAll,
    Staking,
}

/// Transfers that sweep an account may dip below the existential deposit; everything else keeps it.
pub fn strict_mode(extrinsic: Option<ExtrinsicKind>) -> bool {
    !matches!(extrinsic, Some(ExtrinsicKind::TransferAll))
}

pub fn applied_existential_deposit(
    existential_deposit: &str,
    strict: bool,
) -> Result<U256, BalanceError> {
    if strict {
        parse_amount("existentialDeposit", existential_deposit)
    } else {
        Ok(U256::ZERO)
    }
}

fn parse_amount(field: &'static str, value: &str) -> Result<U256, BalanceError> {
    parse_quantity(value).ok_or_else(|| BalanceError::InvalidAmount {
        field,
        value: value.to_owned(),
    })
}

pub fn tokens_pallet_transferable(
    account: &TokensAccountData,
    existential_deposit: &str,
    extrinsic: Option<ExtrinsicKind>,
) -> Result<U256, BalanceError> {
    let ed = applied_existential_deposit(existential_deposit, strict_mode(extrinsic))?;
    let frozen = parse_amount("frozen", &account.frozen)?;
    let free = parse_amount("free", &account.free)?;
    Ok(free.saturating_sub(frozen.max(ed)))
}

pub fn tokens_pallet_locked(account: &TokensAccountData) -> Result<U256, BalanceError> {
    let reserved = parse_amount("reserved", &account.reserved)?;
    Ok(reserved.saturating_add(parse_amount("frozen", &account.frozen)?))
}

pub fn tokens_pallet_total(account: &TokensAccountData) -> Result<U256, BalanceError> {
    let free = parse_amount("free", &account.free)?;
    Ok(free.saturating_add(parse_amount("reserved", &account.reserved)?))
}

pub fn orml_tokens_transferable(
    account: &TokensAccountData,
    existential_deposit: &str,
    extrinsic: Option<ExtrinsicKind>,
) -> Result<U256, BalanceError> {
    tokens_pallet_transferable(account, existential_deposit, extrinsic)
}

pub fn orml_tokens_locked(account: &TokensAccountData) -> Result<U256, BalanceError> {
    tokens_pallet_locked(account)
}
