//! Progress events emitted while a deployment runs.

use hoist_core::{FutureId, TxHash};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::state::ExecutionStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ExecutionEvent {
    #[serde(rename_all = "camelCase")]
    RunStarted {
        chain_id: u64,
        batches: Vec<Vec<FutureId>>,
    },
    #[serde(rename_all = "camelCase")]
    BatchStarted {
        index: usize,
        futures: Vec<FutureId>,
    },
    #[serde(rename_all = "camelCase")]
    BatchCompleted { index: usize },
    #[serde(rename_all = "camelCase")]
    FutureStarted { future_id: FutureId },
    #[serde(rename_all = "camelCase")]
    FutureCompleted {
        future_id: FutureId,
        status: ExecutionStatus,
    },
    #[serde(rename_all = "camelCase")]
    TransactionSent {
        future_id: FutureId,
        hash: TxHash,
        nonce: u64,
        attempt: u32,
    },
    #[serde(rename_all = "camelCase")]
    TransactionConfirmed {
        future_id: FutureId,
        hash: TxHash,
        block_number: u64,
    },
    #[serde(rename_all = "camelCase")]
    FeesBumped { future_id: FutureId, attempt: u32 },
    /// The run stopped on purpose after the configured number of
    /// submissions; the journal is resumable.
    #[serde(rename_all = "camelCase")]
    Halted { pending_transactions: usize },
}

/// Receives every [`ExecutionEvent`]. Called inline from the engine, so
/// implementations must not block.
pub trait ExecutionEventListener: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ExecutionEventListener for NoopListener {
    fn on_event(&self, _event: &ExecutionEvent) {}
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: UnboundedSender<ExecutionEvent>,
}

impl ChannelListener {
    pub fn new(sender: UnboundedSender<ExecutionEvent>) -> Self {
        ChannelListener { sender }
    }
}

impl ExecutionEventListener for ChannelListener {
    fn on_event(&self, event: &ExecutionEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.send(event.clone());
    }
}
