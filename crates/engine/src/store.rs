use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use hoist_core::{Address, FutureId};
use hoist_journal::{ExecutionResult, JournalMessage};
use tokio::sync::Mutex;
use tracing::{info, trace};

use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionEventListener, NoopListener};
use crate::loader::DeploymentLoader;
use crate::state::{DeploymentState, ExecutionState};

/// The single writer of a deployment's journal.
///
/// Every transition goes through [`record`](Self::record): it is applied
/// first, so a message that violates an invariant never reaches the
/// journal, then appended; a failed append reverts it. Appends are
/// serialized by the state lock, so the journal order is the order the
/// state was folded in and readers never see an unjournaled message.
pub struct ExecutionStore {
    loader: Arc<dyn DeploymentLoader>,
    state: Mutex<DeploymentState>,
    listener: Arc<dyn ExecutionEventListener>,
    halt_after: Option<usize>,
    sent: AtomicUsize,
    halted: AtomicBool,
}

impl ExecutionStore {
    /// Replay the loader's journal and fold it.
    pub async fn open(loader: Arc<dyn DeploymentLoader>) -> Result<ExecutionStore, EngineError> {
        let messages = loader.journal().replay().await?;
        let state = DeploymentState::fold(&messages)?;
        trace!(messages = messages.len(), "journal replayed");
        Ok(ExecutionStore {
            loader,
            state: Mutex::new(state),
            listener: Arc::new(NoopListener),
            halt_after: None,
            sent: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
        })
    }

    pub fn with_listener(mut self, listener: Arc<dyn ExecutionEventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Stop the run once this many transactions have been submitted.
    pub fn halt_after(mut self, pending: Option<usize>) -> Self {
        self.halt_after = pending;
        self
    }

    pub fn loader(&self) -> &Arc<dyn DeploymentLoader> {
        &self.loader
    }

    pub fn emit(&self, event: ExecutionEvent) {
        self.listener.on_event(&event);
    }

    pub async fn snapshot(&self) -> DeploymentState {
        self.state.lock().await.clone()
    }

    pub async fn execution_state(&self, id: &FutureId) -> Option<ExecutionState> {
        self.state.lock().await.get(id).cloned()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub async fn record(&self, message: JournalMessage) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let saved = state.apply_revertible(&message)?;
        if let Err(err) = self.loader.journal().append(&message).await {
            state.revert(saved);
            return Err(err.into());
        }
        trace!(kind = message.type_name(), future = ?message.future_id(), "recorded");

        if refreshes_addresses(&message) {
            let addresses: BTreeMap<FutureId, Address> = state.deployed_addresses();
            self.loader.write_deployed_addresses(&addresses).await?;
        }
        drop(state);

        if matches!(message, JournalMessage::TransactionSend { .. }) {
            let sent = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(limit) = self.halt_after {
                if sent >= limit && !self.halted.swap(true, Ordering::SeqCst) {
                    info!(pending = sent, "halting after the configured number of submissions");
                    self.emit(ExecutionEvent::Halted {
                        pending_transactions: sent,
                    });
                }
            }
        }
        Ok(())
    }
}

fn refreshes_addresses(message: &JournalMessage) -> bool {
    match message {
        JournalMessage::ExecutionStateComplete {
            result: ExecutionResult::Success { value },
            ..
        } => value.address().is_some(),
        JournalMessage::WipeApply { .. } => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryDeploymentLoader;
    use hoist_journal::{ExecutionInputs, ResultValue};

    fn loader() -> Arc<MemoryDeploymentLoader> {
        Arc::new(MemoryDeploymentLoader::new())
    }

    fn initialize(id: &str) -> JournalMessage {
        JournalMessage::ExecutionStateInitialize {
            future_id: FutureId::from_raw(id),
            dependencies: Default::default(),
            inputs: ExecutionInputs::ContractAt {
                artifact_id: FutureId::from_raw(id),
                contract_name: "Foo".into(),
                address: Address::repeat_byte(0x33),
            },
        }
    }

    #[tokio::test]
    async fn invalid_message_is_not_appended() {
        let loader = loader();
        let store = ExecutionStore::open(loader.clone()).await.unwrap();
        store.record(initialize("M#A")).await.unwrap();
        assert!(store.record(initialize("M#A")).await.is_err());
        assert_eq!(loader.memory_journal().len().await, 1);
    }

    #[tokio::test]
    async fn failed_append_leaves_the_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(crate::loader::FileDeploymentLoader::new(dir.path()));
        let store = ExecutionStore::open(loader).await.unwrap();
        store.record(JournalMessage::RunStart { chain_id: 5 }).await.unwrap();
        store.record(initialize("M#A")).await.unwrap();
        let before = store.snapshot().await;

        // A directory in the journal's place makes every append fail.
        let journal = dir.path().join("journal.jsonl");
        std::fs::remove_file(&journal).unwrap();
        std::fs::create_dir(&journal).unwrap();

        assert!(store.record(initialize("M#B")).await.is_err());
        assert!(store
            .record(JournalMessage::WipeApply {
                future_id: FutureId::from_raw("M#A"),
            })
            .await
            .is_err());
        assert_eq!(store.snapshot().await, before);
    }

    #[test]
    fn rejected_message_is_reverted_in_place() {
        let mut state = DeploymentState::default();
        state.apply(&initialize("M#A")).unwrap();
        let before = state.clone();

        assert!(state.apply_revertible(&initialize("M#A")).is_err());
        assert_eq!(state, before);

        let saved = state.apply_revertible(&initialize("M#B")).unwrap();
        assert!(state.get(&FutureId::from_raw("M#B")).is_some());
        state.revert(saved);
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn address_results_refresh_the_map() {
        let loader = loader();
        let store = ExecutionStore::open(loader.clone()).await.unwrap();
        store.record(initialize("M#A")).await.unwrap();
        store
            .record(JournalMessage::ExecutionStateComplete {
                future_id: FutureId::from_raw("M#A"),
                result: ExecutionResult::Success {
                    value: ResultValue::Address {
                        address: Address::repeat_byte(0x33),
                    },
                },
            })
            .await
            .unwrap();
        let map = loader.read_deployed_addresses().await.unwrap();
        assert_eq!(map.get(&FutureId::from_raw("M#A")), Some(&Address::repeat_byte(0x33)));

        store
            .record(JournalMessage::WipeApply {
                future_id: FutureId::from_raw("M#A"),
            })
            .await
            .unwrap();
        assert!(loader.read_deployed_addresses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_folds_the_same_state() {
        let loader = loader();
        let store = ExecutionStore::open(loader.clone()).await.unwrap();
        store.record(JournalMessage::RunStart { chain_id: 5 }).await.unwrap();
        store.record(initialize("M#A")).await.unwrap();
        let before = store.snapshot().await;
        let reopened = ExecutionStore::open(loader).await.unwrap();
        assert_eq!(reopened.snapshot().await, before);
    }
}
