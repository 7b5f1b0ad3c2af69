//! Conformance test suite for `Journal` implementations.
//!
//! A backend-agnostic suite that any `Journal` implementation can run to
//! verify it honours the contract the engine relies on:
//!
//! - **Replay**: empty journals replay nothing, every message kind replays
//!   unchanged
//! - **Append**: replay order equals append order, interleaved futures stay
//!   interleaved exactly
//! - **Concurrent**: appends from many tasks all land, each intact
//!
//! # Usage
//!
//! ```ignore
//! use hoist_journal::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryJournal::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod append;
mod concurrent;
mod replay;

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use hoist_core::{Address, Bytes, FutureId, FutureKind, TxHash, Wei, B256};

use crate::message::JournalMessage;
use crate::record::{
    ExecutionInputs, ExecutionResult, FailureReason, NetworkFees, NetworkInteractionRequest,
    RawStaticCallResult, ResultValue, Transaction, TransactionReceipt,
};
use crate::Journal;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "replay", "append").
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in self.results.iter().filter(|r| !r.passed) {
            writeln!(
                f,
                "  FAIL [{}/{}]: {}",
                r.category,
                r.name,
                r.message.as_deref().unwrap_or("(no message)")
            )?;
        }
        Ok(())
    }
}

/// Run the full conformance suite against a journal backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// journal, ensuring test isolation.
pub async fn run_conformance_suite<J, F, Fut>(factory: F) -> ConformanceReport
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let mut results = Vec::new();

    results.extend(replay::run_replay_tests(&factory).await);
    results.extend(append::run_append_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: one message of every kind ───────────────────────────────────────

fn sender() -> Address {
    Address::repeat_byte(0x11)
}

fn hash(byte: u8) -> TxHash {
    B256::new([byte; 32])
}

fn make_initialize(id: &str) -> JournalMessage {
    JournalMessage::ExecutionStateInitialize {
        future_id: FutureId::from_raw(id),
        dependencies: BTreeSet::new(),
        inputs: ExecutionInputs::ContractDeployment {
            artifact_id: FutureId::from_raw(id),
            contract_name: "Foo".to_string(),
            constructor_args: vec![serde_json::json!("1"), serde_json::json!(["a", "b"])],
            libraries: Default::default(),
            value: Wei::ZERO,
            from: sender(),
        },
    }
}

fn make_send(id: &str, attempt: u32) -> JournalMessage {
    JournalMessage::TransactionSend {
        future_id: FutureId::from_raw(id),
        network_interaction_id: 1,
        transaction: Transaction {
            hash: hash(attempt as u8 + 1),
            fees: NetworkFees::Eip1559 {
                max_fee_per_gas: Wei::new(2_000_000_000 + attempt as u128),
                max_priority_fee_per_gas: Wei::new(1_000_000_000),
            },
            attempt,
            sent_at: 1_700_000_000_000 + attempt as u64,
        },
    }
}

/// One message of every kind, in a plausible lifecycle order.
fn every_message_kind() -> Vec<JournalMessage> {
    let id = || FutureId::from_raw("Conformance#Foo");
    vec![
        JournalMessage::RunStart { chain_id: 31337 },
        make_initialize("Conformance#Foo"),
        JournalMessage::NetworkInteractionRequest {
            future_id: id(),
            network_interaction: NetworkInteractionRequest::Onchain {
                id: 1,
                to: None,
                data: Bytes::from(vec![0x60, 0x80]),
                value: Wei::ZERO,
                from: sender(),
            },
        },
        JournalMessage::TransactionPrepareSend {
            future_id: id(),
            network_interaction_id: 1,
            nonce: 0,
        },
        make_send("Conformance#Foo", 0),
        JournalMessage::OnchainInteractionBumpFees {
            future_id: id(),
            network_interaction_id: 1,
        },
        JournalMessage::OnchainInteractionDropped {
            future_id: id(),
            network_interaction_id: 1,
        },
        JournalMessage::TransactionConfirm {
            future_id: id(),
            network_interaction_id: 1,
            hash: hash(1),
            receipt: TransactionReceipt {
                transaction_hash: hash(1),
                block_number: 12,
                block_hash: hash(0xbb),
                status: true,
                contract_address: Some(Address::repeat_byte(0x22)),
                logs: Vec::new(),
            },
        },
        JournalMessage::StaticCallComplete {
            future_id: FutureId::from_raw("Conformance#read"),
            network_interaction_id: 1,
            result: RawStaticCallResult {
                success: true,
                return_data: Bytes::from(vec![0; 32]),
            },
        },
        JournalMessage::OnchainInteractionTimeout {
            future_id: FutureId::from_raw("Conformance#slow"),
            network_interaction_id: 1,
        },
        JournalMessage::ExecutionStateComplete {
            future_id: id(),
            result: ExecutionResult::Success {
                value: ResultValue::Address {
                    address: Address::repeat_byte(0x22),
                },
            },
        },
        JournalMessage::ExecutionStateComplete {
            future_id: FutureId::from_raw("Conformance#bad"),
            result: ExecutionResult::Failed {
                reason: FailureReason::NonceConsumedExternally {
                    sender: sender(),
                    nonce: 4,
                },
            },
        },
        JournalMessage::ExecutionStateDependencyFailed {
            future_id: FutureId::from_raw("Conformance#after"),
            kind: FutureKind::Call,
            dependencies: [id()].into_iter().collect(),
            dependency: FutureId::from_raw("Conformance#bad"),
        },
        JournalMessage::WipeApply { future_id: id() },
    ]
}
