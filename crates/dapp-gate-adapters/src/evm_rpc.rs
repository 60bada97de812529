use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use dapp_gate_core::domain::TransactionConfig;
use dapp_gate_core::ports::EvmApi;
use dapp_gate_core::utils::parse_quantity;
use dapp_gate_core::PortError;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

/// `EvmApi` over plain JSON-RPC 2.0 HTTP.
#[derive(Debug)]
pub struct JsonRpcEvmApi {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcEvmApi {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Transport(format!("failed to build rpc client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, url = %self.url, "rpc call");
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("{method} request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Transport(format!("{method} status {status}: {body}")));
        }
        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("{method} json decode failed: {e}")))?;
        if let Some(err) = body.error {
            return Err(PortError::Transport(format!(
                "{method} returned error {}: {}",
                err.code, err.message
            )));
        }
        body.result
            .ok_or_else(|| PortError::Transport(format!("{method} missing result")))
    }

    async fn quantity_call(&self, method: &str, params: Value) -> Result<U256, PortError> {
        let result = self.rpc_call(method, params).await?;
        decode_quantity(method, &result)
    }
}

fn decode_quantity(method: &str, value: &Value) -> Result<U256, PortError> {
    value
        .as_str()
        .and_then(parse_quantity)
        .ok_or_else(|| PortError::Validation(format!("{method} returned non-quantity {value}")))
}

fn hex_quantity(decimal: Option<&str>) -> Option<String> {
    decimal
        .filter(|v| !v.is_empty())
        .and_then(parse_quantity)
        .map(|v| format!("{v:#x}"))
}

/// Call object for `eth_estimateGas`. Numeric fields are sent as hex quantities; fields that do not
/// parse are left out.
fn call_object(tx: &TransactionConfig) -> Value {
    let mut obj = Map::new();
    obj.insert("from".to_owned(), Value::String(tx.from.clone()));
    if let Some(to) = &tx.to {
        obj.insert("to".to_owned(), Value::String(to.clone()));
    }
    let quantities = [
        ("value", tx.value.as_deref()),
        ("gasPrice", tx.gas_price.as_deref()),
        ("maxFeePerGas", tx.max_fee_per_gas.as_deref()),
        ("maxPriorityFeePerGas", tx.max_priority_fee_per_gas.as_deref()),
    ];
    for (name, value) in quantities {
        if let Some(hex) = hex_quantity(value) {
            obj.insert(name.to_owned(), Value::String(hex));
        }
    }
    if let Some(data) = &tx.data {
        obj.insert("data".to_owned(), Value::String(data.clone()));
    }
    Value::Object(obj)
}

#[async_trait]
impl EvmApi for JsonRpcEvmApi {
    async fn estimate_gas(
        &self,
        tx: &TransactionConfig,
        cancel: &CancellationToken,
    ) -> Result<U256, PortError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(PortError::Transport("eth_estimateGas cancelled".to_owned())),
            gas = self.quantity_call("eth_estimateGas", json!([call_object(tx)])) => gas,
        }
    }

    async fn get_balance(&self, address: &str) -> Result<U256, PortError> {
        self.quantity_call("eth_getBalance", json!([address, "latest"]))
            .await
    }

    async fn get_transaction_count(&self, address: &str) -> Result<u64, PortError> {
        let count = self
            .quantity_call("eth_getTransactionCount", json!([address, "latest"]))
            .await?;
        u64::try_from(count)
            .map_err(|e| PortError::Validation(format!("nonce out of range: {e}")))
    }

    async fn get_code(&self, address: &str) -> Result<String, PortError> {
        let code = self
            .rpc_call("eth_getCode", json!([address, "latest"]))
            .await?;
        code.as_str()
            .map(str::to_owned)
            .ok_or_else(|| PortError::Validation(format!("eth_getCode returned {code}")))
    }

    async fn gas_price(&self) -> Result<U256, PortError> {
        self.quantity_call("eth_gasPrice", json!([])).await
    }

    async fn max_priority_fee_per_gas(&self) -> Result<U256, PortError> {
        self.quantity_call("eth_maxPriorityFeePerGas", json!([]))
            .await
    }

    async fn latest_base_fee(&self) -> Result<Option<U256>, PortError> {
        let block = self
            .rpc_call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        match block.get("baseFeePerGas") {
            None | Some(Value::Null) => Ok(None),
            Some(fee) => decode_quantity("eth_getBlockByNumber", fee).map(Some),
        }
    }
}
