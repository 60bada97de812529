use alloy::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy::hex;
use alloy::json_abi::{Function, JsonAbi};
use serde::Serialize;
use serde_json::Value;

use dapp_gate_core::ports::EvmApi;
use dapp_gate_core::PortError;

const ERC20_ABI: &str = r#"[
  {"type":"function","name":"transfer","stateMutability":"nonpayable","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"approve","stateMutability":"nonpayable","inputs":[{"name":"spender","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"transferFrom","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]}
]"#;

const ERC721_ABI: &str = r#"[
  {"type":"function","name":"safeTransferFrom","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"tokenId","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"safeTransferFrom","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"tokenId","type":"uint256"},{"name":"data","type":"bytes"}],"outputs":[]},
  {"type":"function","name":"setApprovalForAll","stateMutability":"nonpayable","inputs":[{"name":"operator","type":"address"},{"name":"approved","type":"bool"}],"outputs":[]}
]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStandard {
    Erc20,
    Erc721,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedArg {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCalldata {
    pub standard: TokenStandard,
    pub method: String,
    pub signature: String,
    pub args: Vec<ParsedArg>,
}

/// Decodes transaction input against the ERC-20 and ERC-721 interfaces.
#[derive(Debug, Clone)]
pub struct EvmCalldataParser {
    abis: Vec<(TokenStandard, JsonAbi)>,
}

impl EvmCalldataParser {
    pub fn new() -> Result<Self, PortError> {
        let erc20: JsonAbi = serde_json::from_str(ERC20_ABI)
            .map_err(|e| PortError::Validation(format!("invalid erc20 abi json: {e}")))?;
        let erc721: JsonAbi = serde_json::from_str(ERC721_ABI)
            .map_err(|e| PortError::Validation(format!("invalid erc721 abi json: {e}")))?;
        Ok(Self {
            abis: vec![(TokenStandard::Erc20, erc20), (TokenStandard::Erc721, erc721)],
        })
    }

    fn find(&self, selector: &[u8]) -> Option<(TokenStandard, &Function)> {
        self.abis.iter().find_map(|(standard, abi)| {
            abi.functions()
                .find(|f| f.selector().as_slice() == selector)
                .map(|f| (*standard, f))
        })
    }

    /// `Ok(None)` for empty input or an unknown selector.
    pub fn parse(&self, input: &str) -> Result<Option<ParsedCalldata>, PortError> {
        let bytes = hex::decode(input.trim())
            .map_err(|e| PortError::Validation(format!("calldata is not hex: {e}")))?;
        if bytes.len() < 4 {
            return Ok(None);
        }
        let Some((standard, function)) = self.find(&bytes[..4]) else {
            return Ok(None);
        };
        let values = function
            .abi_decode_input(&bytes[4..], true)
            .map_err(|e| PortError::Validation(format!("{} decode failed: {e}", function.name)))?;
        let args = function
            .inputs
            .iter()
            .zip(values.iter())
            .map(|(input, value)| ParsedArg {
                name: input.name.clone(),
                ty: input.ty.clone(),
                value: format_value(value),
            })
            .collect();
        Ok(Some(ParsedCalldata {
            standard,
            method: function.name.clone(),
            signature: function.signature(),
            args,
        }))
    }
}

/// True when `address` holds deployed code.
pub async fn is_contract(api: &dyn EvmApi, address: &str) -> Result<bool, PortError> {
    let code = api.get_code(address).await?;
    let code = code.trim();
    Ok(!code.is_empty() && code != "0x")
}

fn format_value(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Uint(v, _) => Value::String(v.to_string()),
        DynSolValue::Int(v, _) => Value::String(v.to_string()),
        DynSolValue::Address(a) => Value::String(a.to_checksum(None)),
        DynSolValue::FixedBytes(b, size) => Value::String(hex::encode_prefixed(&b[..*size])),
        DynSolValue::Bytes(b) => Value::String(hex::encode_prefixed(b)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(format_value).collect())
        }
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // transfer(0x...dEaD, 1000)
    const TRANSFER: &str = "0xa9059cbb000000000000000000000000000000000000000000000000000000000000dead00000000000000000000000000000000000000000000000000000000000003e8";

    #[test]
    fn decodes_erc20_transfer() {
        let parser = EvmCalldataParser::new().expect("parser");
        let parsed = parser.parse(TRANSFER).expect("parse").expect("known selector");
        assert_eq!(parsed.standard, TokenStandard::Erc20);
        assert_eq!(parsed.method, "transfer");
        assert_eq!(parsed.signature, "transfer(address,uint256)");
        assert_eq!(parsed.args[1].value, Value::String("1000".to_owned()));
        assert_eq!(parsed.args[0].name, "to");
    }

    #[test]
    fn unknown_selector_and_short_input_are_not_errors() {
        let parser = EvmCalldataParser::new().expect("parser");
        assert!(parser.parse("0x").expect("empty").is_none());
        assert!(parser.parse("0xdeadbeef").expect("unknown").is_none());
        assert!(parser.parse("0xzz").is_err());
    }
}
