//! JSON-RPC over HTTP.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so the
//! async runtime is never blocked on the network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hoist_core::primitives::{format_quantity, parse_quantity};
use hoist_core::{Address, TxHash, Wei};
use hoist_journal::{Log, NetworkFees, RawStaticCallResult, TransactionReceipt};
use serde_json::{json, Value};
use tracing::debug;

use super::rpc::{
    BlockTag, CallRequest, FeeData, JsonRpcClient, RpcError, RpcTransaction, TransactionRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Tip used when the node does not implement `eth_maxPriorityFeePerGas`.
const FALLBACK_PRIORITY_FEE: Wei = Wei::new(1_000_000_000);

/// A [`JsonRpcClient`] talking to a node's HTTP endpoint.
pub struct HttpJsonRpcClient {
    url: String,
    agent: ureq::Agent,
    next_id: AtomicU64,
}

impl HttpJsonRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        HttpJsonRpcClient {
            url: url.into(),
            agent: config.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one request and return its `result`.
    async fn request(&self, method: &'static str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let agent = self.agent.clone();
        let url = self.url.clone();
        debug!(method, id, "rpc request");

        let response = tokio::task::spawn_blocking(move || {
            let response = agent.post(&url).send_json(&body).map_err(|e| match e {
                ureq::Error::StatusCode(status) => RpcError::Http { status },
                other => RpcError::Transport(other.to_string()),
            })?;
            response
                .into_body()
                .read_json::<Value>()
                .map_err(|e| RpcError::Decode(format!("response is not JSON: {}", e)))
        })
        .await
        .map_err(|e| RpcError::Transport(format!("task join error: {}", e)))??;

        if let Some(error) = response.get("error") {
            return Err(RpcError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
                data: error.get("data").cloned(),
            });
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::Decode(format!("{} response has no result", method)))
    }
}

// ──────────────────────────────────────────────
// Wire conversions
// ──────────────────────────────────────────────

fn wei_quantity(value: Wei) -> String {
    format!("0x{:x}", value.0)
}

fn as_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, RpcError> {
    value
        .as_str()
        .ok_or_else(|| RpcError::Decode(format!("{} is not a string: {}", what, value)))
}

fn quantity(value: &Value, what: &str) -> Result<u64, RpcError> {
    parse_quantity(as_str(value, what)?).map_err(|e| RpcError::Decode(format!("{}: {}", what, e)))
}

fn wei(value: &Value, what: &str) -> Result<Wei, RpcError> {
    as_str(value, what)?
        .parse()
        .map_err(|e| RpcError::Decode(format!("{}: {}", what, e)))
}

fn parsed<T: std::str::FromStr>(value: &Value, what: &str) -> Result<T, RpcError>
where
    T::Err: std::fmt::Display,
{
    as_str(value, what)?
        .parse()
        .map_err(|e: T::Err| RpcError::Decode(format!("{}: {}", what, e)))
}

fn call_object(request: &CallRequest) -> Value {
    let mut obj = json!({
        "from": request.from.to_string(),
        "data": request.data.to_string(),
        "value": wei_quantity(request.value),
    });
    if let Some(to) = request.to {
        obj["to"] = Value::String(to.to_string());
    }
    obj
}

fn transaction_object(request: &TransactionRequest) -> Value {
    let mut obj = json!({
        "from": request.from.to_string(),
        "data": request.data.to_string(),
        "value": wei_quantity(request.value),
        "nonce": format_quantity(request.nonce),
        "gas": format_quantity(request.gas_limit),
    });
    if let Some(to) = request.to {
        obj["to"] = Value::String(to.to_string());
    }
    match request.fees {
        NetworkFees::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            obj["maxFeePerGas"] = Value::String(wei_quantity(max_fee_per_gas));
            obj["maxPriorityFeePerGas"] = Value::String(wei_quantity(max_priority_fee_per_gas));
        }
        NetworkFees::Legacy { gas_price } => {
            obj["gasPrice"] = Value::String(wei_quantity(gas_price));
        }
    }
    obj
}

fn parse_receipt(value: &Value) -> Result<TransactionReceipt, RpcError> {
    let contract_address = match value.get("contractAddress") {
        None | Some(Value::Null) => None,
        Some(v) => Some(parsed::<Address>(v, "contractAddress")?),
    };
    let logs = match value.get("logs") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value::<Vec<Log>>(v.clone())
            .map_err(|e| RpcError::Decode(format!("logs: {}", e)))?,
    };
    Ok(TransactionReceipt {
        transaction_hash: parsed(&value["transactionHash"], "transactionHash")?,
        block_number: quantity(&value["blockNumber"], "blockNumber")?,
        block_hash: parsed(&value["blockHash"], "blockHash")?,
        status: quantity(&value["status"], "status")? == 1,
        contract_address,
        logs,
    })
}

#[async_trait]
impl JsonRpcClient for HttpJsonRpcClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        quantity(&self.request("eth_chainId", json!([])).await?, "chainId")
    }

    async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        let result = self.request("eth_accounts", json!([])).await?;
        let items = result
            .as_array()
            .ok_or_else(|| RpcError::Decode("eth_accounts did not return a list".to_string()))?;
        items.iter().map(|v| parsed(v, "account")).collect()
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        quantity(
            &self.request("eth_blockNumber", json!([])).await?,
            "blockNumber",
        )
    }

    async fn call(&self, request: &CallRequest) -> Result<RawStaticCallResult, RpcError> {
        match self
            .request("eth_call", json!([call_object(request), "latest"]))
            .await
        {
            Ok(result) => Ok(RawStaticCallResult {
                success: true,
                return_data: parsed(&result, "call result")?,
            }),
            Err(err) => match err.revert_data() {
                Some(return_data) => Ok(RawStaticCallResult {
                    success: false,
                    return_data,
                }),
                None => Err(err),
            },
        }
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError> {
        quantity(
            &self
                .request("eth_estimateGas", json!([call_object(request)]))
                .await?,
            "gas estimate",
        )
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash, RpcError> {
        let result = self
            .request("eth_sendTransaction", json!([transaction_object(request)]))
            .await?;
        parsed(&result, "transaction hash")
    }

    async fn get_transaction(&self, hash: &TxHash) -> Result<Option<RpcTransaction>, RpcError> {
        let result = self
            .request("eth_getTransactionByHash", json!([hash.to_string()]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let block_number = match result.get("blockNumber") {
            None | Some(Value::Null) => None,
            Some(v) => Some(quantity(v, "blockNumber")?),
        };
        Ok(Some(RpcTransaction {
            hash: parsed(&result["hash"], "hash")?,
            nonce: quantity(&result["nonce"], "nonce")?,
            block_number,
        }))
    }

    async fn get_transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        let result = self
            .request("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        parse_receipt(&result).map(Some)
    }

    async fn get_transaction_count(
        &self,
        address: &Address,
        tag: BlockTag,
    ) -> Result<u64, RpcError> {
        quantity(
            &self
                .request(
                    "eth_getTransactionCount",
                    json!([address.to_string(), tag.as_str()]),
                )
                .await?,
            "transaction count",
        )
    }

    async fn network_fees(&self) -> Result<FeeData, RpcError> {
        let block = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let base_fee_per_gas = match block.get("baseFeePerGas") {
            None | Some(Value::Null) => None,
            Some(v) => Some(wei(v, "baseFeePerGas")?),
        };
        let gas_price = wei(
            &self.request("eth_gasPrice", json!([])).await?,
            "gasPrice",
        )?;
        let max_priority_fee_per_gas = if base_fee_per_gas.is_some() {
            match self.request("eth_maxPriorityFeePerGas", json!([])).await {
                Ok(v) => wei(&v, "maxPriorityFeePerGas")?,
                Err(err) if err.is_transient() => return Err(err),
                Err(_) => FALLBACK_PRIORITY_FEE,
            }
        } else {
            Wei::ZERO
        };
        Ok(FeeData {
            base_fee_per_gas,
            max_priority_fee_per_gas,
            gas_price,
        })
    }
}
