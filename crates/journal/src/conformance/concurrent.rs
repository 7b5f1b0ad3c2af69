use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use super::{make_send, TestResult};
use crate::{Journal, JournalError, JournalMessage};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 16;

pub(super) async fn run_concurrent_tests<J, F, Fut>(factory: &F) -> Vec<TestResult>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_appends_all_land_intact",
            concurrent_appends_all_land_intact(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "per_task_order_is_preserved",
            per_task_order_is_preserved(factory).await,
        ),
    ]
}

/// N tasks append one message each; every message must replay exactly once.
async fn concurrent_appends_all_land_intact<J, F, Fut>(factory: &F) -> Result<(), String>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let journal = Arc::new(factory().await);
    let mut handles = Vec::new();
    for i in 0..N {
        let j = journal.clone();
        handles.push(tokio::spawn(async move {
            j.append(&make_send(&format!("M#F{}", i), 0)).await
        }));
    }
    for h in handles {
        h.await
            .map_err(|e| format!("task panicked: {e}"))?
            .map_err(|e: JournalError| format!("append: {e}"))?;
    }

    let replayed = journal.replay().await.map_err(|e| e.to_string())?;
    let ids: BTreeSet<String> = replayed
        .iter()
        .filter_map(|m| m.future_id().map(|f| f.to_string()))
        .collect();
    if replayed.len() != N || ids.len() != N {
        return Err(format!(
            "expected {} distinct messages, got {} ({} distinct)",
            N,
            replayed.len(),
            ids.len()
        ));
    }
    Ok(())
}

/// Each task appends a sequence for its own future; within a future the
/// attempts must replay in the order that task appended them.
async fn per_task_order_is_preserved<J, F, Fut>(factory: &F) -> Result<(), String>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let journal = Arc::new(factory().await);
    let mut handles = Vec::new();
    for i in 0..4 {
        let j = journal.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("M#T{}", i);
            for attempt in 0..5 {
                j.append(&make_send(&id, attempt)).await?;
            }
            Ok::<(), JournalError>(())
        }));
    }
    for h in handles {
        h.await
            .map_err(|e| format!("task panicked: {e}"))?
            .map_err(|e| format!("append: {e}"))?;
    }

    let replayed = journal.replay().await.map_err(|e| e.to_string())?;
    for i in 0..4 {
        let id = format!("M#T{}", i);
        let attempts: Vec<u32> = replayed
            .iter()
            .filter_map(|m| match m {
                JournalMessage::TransactionSend {
                    future_id,
                    transaction,
                    ..
                } if future_id.as_str() == id => Some(transaction.attempt),
                _ => None,
            })
            .collect();
        if attempts != [0, 1, 2, 3, 4] {
            return Err(format!("{} attempts replayed as {:?}", id, attempts));
        }
    }
    Ok(())
}
