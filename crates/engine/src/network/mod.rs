//! Everything that talks to the chain: the JSON-RPC seam, its HTTP
//! implementation, retries, nonce allocation, fee selection and the
//! pending-transaction monitor.

pub mod fees;
mod http;
mod monitor;
mod nonce;
mod retry;
mod rpc;

pub use http::HttpJsonRpcClient;
pub use monitor::{check_onchain, MonitorOutcome};
pub use nonce::NonceManager;
pub use retry::{with_retry, RetryPolicy, RetryingClient};
pub use rpc::{
    BlockTag, CallRequest, FeeData, JsonRpcClient, RpcError, RpcTransaction, TransactionRequest,
    EXECUTION_REVERTED,
};

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or(0)
}
