//! The journal message catalog.
//!
//! Each message is exactly one state transition of one future (or, for
//! `RUN_START`, of the deployment). One JSON object per journal line,
//! discriminated by `type`. Optional fields default and unknown fields are
//! ignored so journals written by older versions still replay.

use std::collections::BTreeSet;

use hoist_core::{FutureId, FutureKind, TxHash};
use serde::{Deserialize, Serialize};

use crate::record::{
    ExecutionInputs, ExecutionResult, NetworkInteractionRequest, RawStaticCallResult, Transaction,
    TransactionReceipt,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalMessage {
    #[serde(rename_all = "camelCase")]
    RunStart { chain_id: u64 },

    #[serde(rename_all = "camelCase")]
    WipeApply { future_id: FutureId },

    #[serde(rename_all = "camelCase")]
    ExecutionStateInitialize {
        future_id: FutureId,
        #[serde(default)]
        dependencies: BTreeSet<FutureId>,
        inputs: ExecutionInputs,
    },

    #[serde(rename_all = "camelCase")]
    NetworkInteractionRequest {
        future_id: FutureId,
        network_interaction: NetworkInteractionRequest,
    },

    #[serde(rename_all = "camelCase")]
    TransactionPrepareSend {
        future_id: FutureId,
        network_interaction_id: u32,
        nonce: u64,
    },

    #[serde(rename_all = "camelCase")]
    TransactionSend {
        future_id: FutureId,
        network_interaction_id: u32,
        transaction: Transaction,
    },

    #[serde(rename_all = "camelCase")]
    TransactionConfirm {
        future_id: FutureId,
        network_interaction_id: u32,
        hash: TxHash,
        receipt: TransactionReceipt,
    },

    #[serde(rename_all = "camelCase")]
    StaticCallComplete {
        future_id: FutureId,
        network_interaction_id: u32,
        result: RawStaticCallResult,
    },

    #[serde(rename_all = "camelCase")]
    OnchainInteractionBumpFees {
        future_id: FutureId,
        network_interaction_id: u32,
    },

    #[serde(rename_all = "camelCase")]
    OnchainInteractionDropped {
        future_id: FutureId,
        network_interaction_id: u32,
    },

    #[serde(rename_all = "camelCase")]
    OnchainInteractionTimeout {
        future_id: FutureId,
        network_interaction_id: u32,
    },

    #[serde(rename_all = "camelCase")]
    ExecutionStateComplete {
        future_id: FutureId,
        result: ExecutionResult,
    },

    #[serde(rename_all = "camelCase")]
    ExecutionStateDependencyFailed {
        future_id: FutureId,
        kind: FutureKind,
        #[serde(default)]
        dependencies: BTreeSet<FutureId>,
        dependency: FutureId,
    },
}

impl JournalMessage {
    /// The future this message belongs to; `None` for deployment-level messages.
    pub fn future_id(&self) -> Option<&FutureId> {
        match self {
            JournalMessage::RunStart { .. } => None,
            JournalMessage::WipeApply { future_id }
            | JournalMessage::ExecutionStateInitialize { future_id, .. }
            | JournalMessage::NetworkInteractionRequest { future_id, .. }
            | JournalMessage::TransactionPrepareSend { future_id, .. }
            | JournalMessage::TransactionSend { future_id, .. }
            | JournalMessage::TransactionConfirm { future_id, .. }
            | JournalMessage::StaticCallComplete { future_id, .. }
            | JournalMessage::OnchainInteractionBumpFees { future_id, .. }
            | JournalMessage::OnchainInteractionDropped { future_id, .. }
            | JournalMessage::OnchainInteractionTimeout { future_id, .. }
            | JournalMessage::ExecutionStateComplete { future_id, .. }
            | JournalMessage::ExecutionStateDependencyFailed { future_id, .. } => Some(future_id),
        }
    }

    /// The `type` discriminant as written to the journal.
    pub fn type_name(&self) -> &'static str {
        match self {
            JournalMessage::RunStart { .. } => "RUN_START",
            JournalMessage::WipeApply { .. } => "WIPE_APPLY",
            JournalMessage::ExecutionStateInitialize { .. } => "EXECUTION_STATE_INITIALIZE",
            JournalMessage::NetworkInteractionRequest { .. } => "NETWORK_INTERACTION_REQUEST",
            JournalMessage::TransactionPrepareSend { .. } => "TRANSACTION_PREPARE_SEND",
            JournalMessage::TransactionSend { .. } => "TRANSACTION_SEND",
            JournalMessage::TransactionConfirm { .. } => "TRANSACTION_CONFIRM",
            JournalMessage::StaticCallComplete { .. } => "STATIC_CALL_COMPLETE",
            JournalMessage::OnchainInteractionBumpFees { .. } => "ONCHAIN_INTERACTION_BUMP_FEES",
            JournalMessage::OnchainInteractionDropped { .. } => "ONCHAIN_INTERACTION_DROPPED",
            JournalMessage::OnchainInteractionTimeout { .. } => "ONCHAIN_INTERACTION_TIMEOUT",
            JournalMessage::ExecutionStateComplete { .. } => "EXECUTION_STATE_COMPLETE",
            JournalMessage::ExecutionStateDependencyFailed { .. } => {
                "EXECUTION_STATE_DEPENDENCY_FAILED"
            }
        }
    }

    /// Serialize as one journal line, without the trailing newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> Result<JournalMessage, serde_json::Error> {
        serde_json::from_str(line)
    }
}
