use std::future::Future;

use super::{make_initialize, make_send, TestResult};
use crate::{Journal, JournalMessage};

pub(super) async fn run_append_tests<J, F, Fut>(factory: &F) -> Vec<TestResult>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    vec![
        TestResult::from_result(
            "append",
            "appended_message_is_visible_immediately",
            appended_message_is_visible_immediately(factory).await,
        ),
        TestResult::from_result(
            "append",
            "replay_order_equals_append_order",
            replay_order_equals_append_order(factory).await,
        ),
        TestResult::from_result(
            "append",
            "interleaved_futures_stay_interleaved",
            interleaved_futures_stay_interleaved(factory).await,
        ),
        TestResult::from_result(
            "append",
            "duplicate_messages_are_kept",
            duplicate_messages_are_kept(factory).await,
        ),
    ]
}

/// Once `append` returns, `replay` must include the message.
async fn appended_message_is_visible_immediately<J, F, Fut>(factory: &F) -> Result<(), String>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let j = factory().await;
    let msg = make_initialize("M#A");
    j.append(&msg).await.map_err(|e| e.to_string())?;
    let replayed = j.replay().await.map_err(|e| e.to_string())?;
    if replayed.last() != Some(&msg) {
        return Err("appended message missing from replay".to_string());
    }
    Ok(())
}

async fn replay_order_equals_append_order<J, F, Fut>(factory: &F) -> Result<(), String>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let j = factory().await;
    let expected: Vec<JournalMessage> = (0..20).map(|i| make_send("M#A", i)).collect();
    for msg in &expected {
        j.append(msg).await.map_err(|e| e.to_string())?;
    }
    let replayed = j.replay().await.map_err(|e| e.to_string())?;
    if replayed != expected {
        return Err("replayed sequence differs from appended sequence".to_string());
    }
    Ok(())
}

async fn interleaved_futures_stay_interleaved<J, F, Fut>(factory: &F) -> Result<(), String>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let j = factory().await;
    let expected = vec![
        make_initialize("M#A"),
        make_initialize("M#B"),
        make_send("M#B", 0),
        make_send("M#A", 0),
        make_send("M#B", 1),
    ];
    for msg in &expected {
        j.append(msg).await.map_err(|e| e.to_string())?;
    }
    let ids: Vec<String> = j
        .replay()
        .await
        .map_err(|e| e.to_string())?
        .iter()
        .filter_map(|m| m.future_id().map(|f| f.to_string()))
        .collect();
    if ids != ["M#A", "M#B", "M#B", "M#A", "M#B"] {
        return Err(format!("unexpected future order: {:?}", ids));
    }
    Ok(())
}

/// The journal is a log, not a set: identical messages are both persisted.
async fn duplicate_messages_are_kept<J, F, Fut>(factory: &F) -> Result<(), String>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let j = factory().await;
    let msg = make_send("M#A", 0);
    j.append(&msg).await.map_err(|e| e.to_string())?;
    j.append(&msg).await.map_err(|e| e.to_string())?;
    let count = j.replay().await.map_err(|e| e.to_string())?.len();
    if count != 2 {
        return Err(format!("expected 2 messages, got {}", count));
    }
    Ok(())
}
