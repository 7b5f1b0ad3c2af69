use std::collections::BTreeSet;

use hoist_core::FutureId;
use hoist_journal::JournalMessage;
use tracing::info;

use crate::error::{EngineError, ValidationError};
use crate::state::DeploymentState;
use crate::store::ExecutionStore;

/// Remove the execution state of `id` and of every recorded state that
/// depends on it, dependents first. Returns the wiped ids in the order
/// they were removed.
pub async fn wipe(store: &ExecutionStore, id: &FutureId) -> Result<Vec<FutureId>, EngineError> {
    let state = store.snapshot().await;
    if state.get(id).is_none() {
        return Err(ValidationError::UnknownFuture(id.clone()).into());
    }

    let order = wipe_order(&state, id);
    for future_id in &order {
        store
            .record(JournalMessage::WipeApply {
                future_id: future_id.clone(),
            })
            .await?;
        info!(future = %future_id, "execution state wiped");
    }
    Ok(order)
}

/// `id` and its recorded dependents, ordered so that no state is removed
/// before the states that depend on it.
pub fn wipe_order(state: &DeploymentState, id: &FutureId) -> Vec<FutureId> {
    let mut affected = BTreeSet::from([id.clone()]);
    loop {
        let before = affected.len();
        for s in state.execution_states.values() {
            if s.dependencies.iter().any(|d| affected.contains(d)) {
                affected.insert(s.id.clone());
            }
        }
        if affected.len() == before {
            break;
        }
    }

    let mut order = Vec::with_capacity(affected.len());
    let mut remaining = affected;
    while !remaining.is_empty() {
        // Leaves: nothing still remaining depends on them.
        let leaves: Vec<FutureId> = remaining
            .iter()
            .filter(|candidate| {
                !remaining.iter().any(|other| {
                    state
                        .get(other)
                        .is_some_and(|s| s.dependencies.contains(*candidate))
                })
            })
            .cloned()
            .collect();
        if leaves.is_empty() {
            // Recorded dependencies cannot form a cycle; drain in id order.
            order.extend(std::mem::take(&mut remaining));
            break;
        }
        for leaf in leaves {
            remaining.remove(&leaf);
            order.push(leaf);
        }
    }
    order
}
