use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hoist_core::{Address, TxHash};
use hoist_journal::{RawStaticCallResult, TransactionReceipt};
use rand::Rng;
use tracing::warn;

use super::rpc::{
    BlockTag, CallRequest, FeeData, JsonRpcClient, RpcError, RpcTransaction, TransactionRequest,
};
use crate::config::RetryConfig;

/// Exponential backoff with random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    fn jittered(&self, retry: u32) -> Duration {
        let base = self.backoff(retry);
        let half = (base.as_millis() / 2) as u64;
        let jitter = if half == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=half)
        };
        (base + Duration::from_millis(jitter)).min(self.max_backoff)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff),
            max_backoff: Duration::from_millis(config.max_backoff),
        }
    }
}

/// Run `op` until it succeeds, fails with an error `retryable` rejects, or
/// the attempts run out.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    method: &str,
    retryable: fn(&RpcError) -> bool,
    mut op: F,
) -> Result<T, RpcError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && retryable(&err) => {
                let delay = policy.jittered(attempt);
                warn!(
                    method,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient rpc failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Wraps a client so that every call is retried under a [`RetryPolicy`].
///
/// Submissions are only repeated when the node refused them outright
/// (rate limiting); any other failure of `eth_sendTransaction` may have
/// reached the mempool and is surfaced instead.
pub struct RetryingClient {
    inner: Arc<dyn JsonRpcClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn JsonRpcClient>, policy: RetryPolicy) -> Self {
        RetryingClient { inner, policy }
    }
}

#[async_trait]
impl JsonRpcClient for RetryingClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        with_retry(&self.policy, "eth_chainId", RpcError::is_transient, || {
            self.inner.chain_id()
        })
        .await
    }

    async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        with_retry(&self.policy, "eth_accounts", RpcError::is_transient, || {
            self.inner.accounts()
        })
        .await
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        with_retry(&self.policy, "eth_blockNumber", RpcError::is_transient, || {
            self.inner.block_number()
        })
        .await
    }

    async fn call(&self, request: &CallRequest) -> Result<RawStaticCallResult, RpcError> {
        with_retry(&self.policy, "eth_call", RpcError::is_transient, || {
            self.inner.call(request)
        })
        .await
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError> {
        with_retry(&self.policy, "eth_estimateGas", RpcError::is_transient, || {
            self.inner.estimate_gas(request)
        })
        .await
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash, RpcError> {
        with_retry(
            &self.policy,
            "eth_sendTransaction",
            RpcError::is_rate_limited,
            || self.inner.send_transaction(request),
        )
        .await
    }

    async fn get_transaction(&self, hash: &TxHash) -> Result<Option<RpcTransaction>, RpcError> {
        with_retry(
            &self.policy,
            "eth_getTransactionByHash",
            RpcError::is_transient,
            || self.inner.get_transaction(hash),
        )
        .await
    }

    async fn get_transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        with_retry(
            &self.policy,
            "eth_getTransactionReceipt",
            RpcError::is_transient,
            || self.inner.get_transaction_receipt(hash),
        )
        .await
    }

    async fn get_transaction_count(
        &self,
        address: &Address,
        tag: BlockTag,
    ) -> Result<u64, RpcError> {
        with_retry(
            &self.policy,
            "eth_getTransactionCount",
            RpcError::is_transient,
            || self.inner.get_transaction_count(address, tag),
        )
        .await
    }

    async fn network_fees(&self) -> Result<FeeData, RpcError> {
        with_retry(&self.policy, "network_fees", RpcError::is_transient, || {
            self.inner.network_fees()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(1000));
        assert_eq!(policy.backoff(10), Duration::from_millis(5000));
        assert_eq!(policy.backoff(40), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(4), "test", RpcError::is_transient, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RpcError::Http { status: 503 })
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_surface_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            with_retry(&fast_policy(4), "test", RpcError::is_transient, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(RpcError::Rpc {
                        code: -32000,
                        message: "nonce too low".into(),
                        data: None,
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_the_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            with_retry(&fast_policy(3), "test", RpcError::is_transient, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RpcError::Transport("connection reset".into())) }
            })
            .await;
        assert_eq!(result, Err(RpcError::Transport("connection reset".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
