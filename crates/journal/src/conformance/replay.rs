use std::future::Future;

use super::{every_message_kind, make_initialize, TestResult};
use crate::Journal;

pub(super) async fn run_replay_tests<J, F, Fut>(factory: &F) -> Vec<TestResult>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    vec![
        TestResult::from_result(
            "replay",
            "empty_journal_replays_nothing",
            empty_journal_replays_nothing(factory).await,
        ),
        TestResult::from_result(
            "replay",
            "every_message_kind_replays_unchanged",
            every_message_kind_replays_unchanged(factory).await,
        ),
        TestResult::from_result(
            "replay",
            "replay_is_repeatable",
            replay_is_repeatable(factory).await,
        ),
    ]
}

async fn empty_journal_replays_nothing<J, F, Fut>(factory: &F) -> Result<(), String>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let j = factory().await;
    let messages = j.replay().await.map_err(|e| e.to_string())?;
    if !messages.is_empty() {
        return Err(format!("expected no messages, got {}", messages.len()));
    }
    Ok(())
}

async fn every_message_kind_replays_unchanged<J, F, Fut>(factory: &F) -> Result<(), String>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let j = factory().await;
    let expected = every_message_kind();
    for msg in &expected {
        j.append(msg).await.map_err(|e| e.to_string())?;
    }
    let replayed = j.replay().await.map_err(|e| e.to_string())?;
    if replayed.len() != expected.len() {
        return Err(format!(
            "expected {} messages, got {}",
            expected.len(),
            replayed.len()
        ));
    }
    for (i, (want, got)) in expected.iter().zip(&replayed).enumerate() {
        if want != got {
            return Err(format!(
                "message {} ({}) changed on replay: {:?}",
                i,
                want.type_name(),
                got
            ));
        }
    }
    Ok(())
}

/// Replay must not consume or alter the log.
async fn replay_is_repeatable<J, F, Fut>(factory: &F) -> Result<(), String>
where
    J: Journal,
    F: Fn() -> Fut,
    Fut: Future<Output = J>,
{
    let j = factory().await;
    j.append(&make_initialize("M#A"))
        .await
        .map_err(|e| e.to_string())?;
    let first = j.replay().await.map_err(|e| e.to_string())?;
    let second = j.replay().await.map_err(|e| e.to_string())?;
    if first != second || first.len() != 1 {
        return Err(format!(
            "replays differ: {} vs {} messages",
            first.len(),
            second.len()
        ));
    }
    Ok(())
}
