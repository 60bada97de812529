use alloy::primitives::{Address, U256};

use crate::domain::NumberLike;
use crate::errors::ValidationError;

const URL_SCHEMES: [&str; 4] = ["http:", "https:", "ipfs:", "ipns:"];

/// Reduces a page url to the origin key used by the authorization store (`https://a.b/c` -> `a.b`).
pub fn strip_url(url: &str) -> Result<String, ValidationError> {
    if url.is_empty() || !URL_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(ValidationError::InvalidUrl(url.to_owned()));
    }
    url.split('/')
        .nth(2)
        .map(str::to_owned)
        .ok_or_else(|| ValidationError::InvalidUrl(url.to_owned()))
}

pub fn is_ethereum_address(address: &str) -> bool {
    address.parse::<Address>().is_ok()
}

/// EVM addresses compare case-insensitively; anything else compares exactly.
pub fn is_same_address(a: &str, b: &str) -> bool {
    match (a.parse::<Address>(), b.parse::<Address>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Converts a dApp-supplied numeric field to a decimal string.
///
/// Hex strings are decoded, JSON numbers are printed as integers, decimal strings are kept. A hex
/// literal that does not decode, or a fractional or negative number, is returned unchanged rather
/// than rejected; callers check the result with [`parse_quantity`].
pub fn auto_format_number(value: Option<&NumberLike>) -> Option<String> {
    match value? {
        NumberLike::Number(n) => Some(format_json_number(n)),
        NumberLike::Text(s) => match s.strip_prefix("0x") {
            Some(hex) => Some(
                U256::from_str_radix(hex, 16)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| s.clone()),
            ),
            None => Some(s.clone()),
        },
    }
}

/// `2e18` arrives as an `f64`; integral floats are printed in full so they parse as wei.
fn format_json_number(n: &serde_json::Number) -> String {
    if let Some(v) = n.as_u64() {
        return v.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => format!("{f:.0}"),
        _ => n.to_string(),
    }
}

/// Parses a decimal (or `0x` hex) quantity. Empty input is zero.
pub fn parse_quantity(value: &str) -> Option<U256> {
    let value = value.trim();
    if value.is_empty() {
        return Some(U256::ZERO);
    }
    match value.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_str_radix(value, 10).ok(),
    }
}
