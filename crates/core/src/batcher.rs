//! Batching: turn the graph into ordered waves of independent futures.
//!
//! A batch is every not-yet-batched future whose dependencies are all in
//! earlier batches (or already complete). Members of one batch never depend
//! on each other and can run concurrently.

use std::collections::BTreeSet;

use crate::error::GraphError;
use crate::future::FutureId;
use crate::graph::Graph;

pub type Batch = Vec<FutureId>;

/// Batch every future of the graph.
pub fn batch(graph: &Graph) -> Result<Vec<Batch>, GraphError> {
    batch_pending(graph, &BTreeSet::new())
}

/// Batch the futures not in `complete`, treating completed futures as
/// already satisfied dependencies. Members of each batch are in id order.
pub fn batch_pending(
    graph: &Graph,
    complete: &BTreeSet<FutureId>,
) -> Result<Vec<Batch>, GraphError> {
    let mut done: BTreeSet<FutureId> = graph
        .ids()
        .iter()
        .filter(|id| complete.contains(*id))
        .cloned()
        .collect();
    let mut remaining: BTreeSet<FutureId> = graph
        .ids()
        .iter()
        .filter(|id| !done.contains(*id))
        .cloned()
        .collect();

    let mut batches = Vec::new();
    while !remaining.is_empty() {
        let ready: Batch = remaining
            .iter()
            .filter(|id| graph.dependencies(id).iter().all(|d| done.contains(d)))
            .cloned()
            .collect();

        if ready.is_empty() {
            // Graph::new rejects cycles, so this is unreachable for a
            // validated graph.
            let stuck: Vec<FutureId> = remaining.into_iter().collect();
            return Err(GraphError::Cycle {
                participants: vec![stuck],
            });
        }

        for id in &ready {
            remaining.remove(id);
            done.insert(id.clone());
        }
        batches.push(ready);
    }
    Ok(batches)
}
