use async_trait::async_trait;
use hoist_core::{Address, Bytes, TxHash, Wei};
use hoist_journal::{NetworkFees, RawStaticCallResult, TransactionReceipt};
use serde_json::Value;

/// JSON-RPC error code for "execution reverted" on `eth_call` and
/// `eth_estimateGas`.
pub const EXECUTION_REVERTED: i64 = 3;
const LIMIT_EXCEEDED: i64 = -32005;

/// Errors from a JSON-RPC node.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// The request never got an HTTP answer (connection refused, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("node answered with HTTP status {status}")]
    Http { status: u16 },

    /// A JSON-RPC `error` object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The node answered with something that is not the expected shape.
    #[error("invalid rpc response: {0}")]
    Decode(String),
}

impl RpcError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Transport(_) => true,
            RpcError::Http { status } => *status == 429 || *status >= 500,
            RpcError::Rpc { code, message, .. } => {
                *code == LIMIT_EXCEEDED || is_rate_limit_message(message)
            }
            RpcError::Decode(_) => false,
        }
    }

    /// Whether the node rejected the request before doing any work. Only
    /// these are safe to repeat for `eth_sendTransaction`.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            RpcError::Http { status } => *status == 429,
            RpcError::Rpc { code, message, .. } => {
                *code == LIMIT_EXCEEDED || is_rate_limit_message(message)
            }
            _ => false,
        }
    }

    /// Revert payload carried by an `execution reverted` error, if any.
    pub fn revert_data(&self) -> Option<Bytes> {
        let RpcError::Rpc { code, message, data } = self else {
            return None;
        };
        let from_data = data.as_ref().and_then(|d| match d {
            Value::String(s) => s.parse::<Bytes>().ok(),
            Value::Object(o) => o.get("data").and_then(Value::as_str)?.parse().ok(),
            _ => None,
        });
        if from_data.is_some() {
            return from_data;
        }
        if *code == EXECUTION_REVERTED || message.contains("revert") {
            return Some(Bytes::default());
        }
        None
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests")
}

/// Which view of an account's transaction count to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    /// Transactions included in the latest block.
    Latest,
    /// Including transactions still in the node's mempool.
    Pending,
}

impl BlockTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockTag::Latest => "latest",
            BlockTag::Pending => "pending",
        }
    }
}

/// An `eth_call` / `eth_estimateGas` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    /// `None` simulates a contract creation.
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: Wei,
}

/// A transaction for the node to sign with one of its accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: Wei,
    pub nonce: u64,
    pub gas_limit: u64,
    pub fees: NetworkFees,
}

/// Fee levels suggested by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeData {
    /// Base fee of the latest block; `None` on chains without EIP-1559.
    pub base_fee_per_gas: Option<Wei>,
    pub max_priority_fee_per_gas: Wei,
    pub gas_price: Wei,
}

/// What the node knows about a transaction it has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTransaction {
    pub hash: TxHash,
    pub nonce: u64,
    /// `None` while the transaction is still pending.
    pub block_number: Option<u64>,
}

/// The subset of the Ethereum JSON-RPC API the engine consumes.
///
/// # Errors
///
/// Implementations return [`RpcError`] for every failure and never retry on
/// their own; retrying is layered on top by
/// [`RetryingClient`](crate::network::RetryingClient).
///
/// # Reverts
///
/// [`call`](Self::call) reports a revert as a result with `success: false`
/// and the revert payload as return data, not as an error.
/// [`estimate_gas`](Self::estimate_gas) reports it as an error whose
/// [`RpcError::revert_data`] is set.
#[async_trait]
pub trait JsonRpcClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;

    async fn accounts(&self) -> Result<Vec<Address>, RpcError>;

    async fn block_number(&self) -> Result<u64, RpcError>;

    async fn call(&self, request: &CallRequest) -> Result<RawStaticCallResult, RpcError>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError>;

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash, RpcError>;

    async fn get_transaction(&self, hash: &TxHash) -> Result<Option<RpcTransaction>, RpcError>;

    async fn get_transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, RpcError>;

    async fn get_transaction_count(&self, address: &Address, tag: BlockTag)
        -> Result<u64, RpcError>;

    async fn network_fees(&self) -> Result<FeeData, RpcError>;
}
