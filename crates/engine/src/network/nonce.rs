use std::collections::{BTreeMap, HashMap};

use hoist_core::Address;
use tokio::sync::Mutex;
use tracing::debug;

use super::rpc::{BlockTag, JsonRpcClient};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy)]
struct Counter {
    next: u64,
    /// A recorded nonce whose first send the node rejected.
    held_at: Option<u64>,
}

/// Hands out nonces, one counter per sender.
///
/// A sender's counter is seeded on first use from the larger of the node's
/// pending transaction count and one past the highest nonce already in the
/// journal, so a restarted run never reuses a nonce it recorded before.
/// Allocation holds the lock across the seeding query, so two futures of
/// the same sender can never draw the same value.
///
/// A held sender gets no new nonces for the rest of the run: anything sent
/// above an unsent nonce could never be mined.
#[derive(Debug, Default)]
pub struct NonceManager {
    journaled: BTreeMap<Address, u64>,
    counters: Mutex<HashMap<Address, Counter>>,
}

impl NonceManager {
    /// `journaled` maps each sender to the highest nonce recorded for it.
    pub fn new(journaled: BTreeMap<Address, u64>) -> Self {
        NonceManager {
            journaled,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub async fn allocate(
        &self,
        client: &dyn JsonRpcClient,
        sender: Address,
    ) -> Result<u64, EngineError> {
        let mut counters = self.counters.lock().await;
        let nonce = match counters.get(&sender) {
            Some(Counter {
                held_at: Some(nonce),
                ..
            }) => {
                return Err(EngineError::SenderHeld {
                    sender,
                    nonce: *nonce,
                })
            }
            Some(counter) => counter.next,
            None => {
                let pending = client
                    .get_transaction_count(&sender, BlockTag::Pending)
                    .await?;
                let after_journal = self.journaled.get(&sender).map_or(0, |n| n + 1);
                debug!(%sender, pending, after_journal, "seeding nonce counter");
                pending.max(after_journal)
            }
        };
        counters.insert(
            sender,
            Counter {
                next: nonce + 1,
                held_at: None,
            },
        );
        Ok(nonce)
    }

    /// Stop allocating for `sender` until the next run, because `nonce`
    /// was recorded but never reached the mempool.
    pub async fn hold(&self, sender: Address, nonce: u64) {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(sender).or_insert(Counter {
            next: nonce + 1,
            held_at: None,
        });
        let held = counter.held_at.map_or(nonce, |n| n.min(nonce));
        counter.held_at = Some(held);
    }
}
