//! The run loop: validate, reconcile, batch, execute.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};

use hoist_core::{batch_pending, Address, ArtifactResolver, FutureId, Graph, ModuleParameters};
use hoist_journal::JournalMessage;

use crate::config::EngineConfig;
use crate::error::{EngineError, ValidationError};
use crate::events::{ExecutionEvent, ExecutionEventListener, NoopListener};
use crate::loader::DeploymentLoader;
use crate::network::{JsonRpcClient, NonceManager, RetryPolicy, RetryingClient};
use crate::processor::{check_parameters, FutureProcessor, ResolveContext};
use crate::reconciler::reconcile;
use crate::state::ExecutionStatus;
use crate::store::ExecutionStore;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub parameters: ModuleParameters,
    /// Sender for futures without `from`; the node's first account otherwise.
    pub default_sender: Option<Address>,
    /// Halt once this many transactions have been submitted.
    pub exit_after_pending: Option<usize>,
}

/// Where a future ended up when the run returned.
#[derive(Debug, Clone, PartialEq)]
pub enum FutureOutcome {
    Finished(ExecutionStatus),
    /// Stopped by a network error or a halt; resumes on the next run.
    Interrupted { message: String },
    /// Its batch was never reached.
    NotReached,
}

impl FutureOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FutureOutcome::Finished(status) => status.as_str(),
            FutureOutcome::Interrupted { .. } => "INTERRUPTED",
            FutureOutcome::NotReached => "NOT_REACHED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub chain_id: u64,
    /// Batches of the futures that still had work at the start of the run.
    pub batches: Vec<Vec<FutureId>>,
    /// Every graph future, in declaration order.
    pub outcomes: Vec<(FutureId, FutureOutcome)>,
    pub halted: bool,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn outcome(&self, id: &FutureId) -> Option<&FutureOutcome> {
        self.outcomes.iter().find(|(f, _)| f == id).map(|(_, o)| o)
    }

    /// Every future succeeded.
    pub fn is_success(&self) -> bool {
        !self.halted
            && self
                .outcomes
                .iter()
                .all(|(_, o)| *o == FutureOutcome::Finished(ExecutionStatus::Success))
    }

    pub fn to_json(&self) -> Value {
        let outcomes: Vec<Value> = self
            .outcomes
            .iter()
            .map(|(id, outcome)| {
                let mut entry = json!({ "id": id, "outcome": outcome.as_str() });
                if let FutureOutcome::Interrupted { message } = outcome {
                    entry["message"] = json!(message);
                }
                entry
            })
            .collect();
        json!({
            "batches": self.batches,
            "chainId": self.chain_id,
            "halted": self.halted,
            "outcomes": outcomes,
            "success": self.is_success(),
            "warnings": self.warnings,
        })
    }

    pub fn to_text(&self) -> String {
        let mut lines = vec![format!(
            "chain {}: {} batch(es) to execute",
            self.chain_id,
            self.batches.len()
        )];
        for (id, outcome) in &self.outcomes {
            match outcome {
                FutureOutcome::Interrupted { message } => {
                    lines.push(format!("{:<11} {}: {}", outcome.as_str(), id, message))
                }
                _ => lines.push(format!("{:<11} {}", outcome.as_str(), id)),
            }
        }
        for w in &self.warnings {
            lines.push(format!("warning: {}", w));
        }
        if self.halted {
            lines.push("halted after the requested number of pending transactions".to_string());
        }
        lines.join("\n")
    }
}

/// Executes module graphs against one node and one deployment.
pub struct Deployer {
    client: Arc<dyn JsonRpcClient>,
    artifacts: Arc<dyn ArtifactResolver>,
    loader: Arc<dyn DeploymentLoader>,
    config: EngineConfig,
    listener: Arc<dyn ExecutionEventListener>,
}

impl Deployer {
    /// The client is wrapped in the retry policy of `config`.
    pub fn new(
        client: Arc<dyn JsonRpcClient>,
        artifacts: Arc<dyn ArtifactResolver>,
        loader: Arc<dyn DeploymentLoader>,
        config: EngineConfig,
    ) -> Self {
        let policy = RetryPolicy::from(&config.retry);
        Deployer {
            client: Arc::new(RetryingClient::new(client, policy)),
            artifacts,
            loader,
            config,
            listener: Arc::new(NoopListener),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ExecutionEventListener>) -> Self {
        self.listener = listener;
        self
    }

    pub async fn run(&self, graph: Graph, options: RunOptions) -> Result<RunReport, EngineError> {
        self.config.validate()?;
        check_parameters(&graph, &options.parameters)?;

        let store = Arc::new(
            ExecutionStore::open(self.loader.clone())
                .await?
                .with_listener(self.listener.clone())
                .halt_after(options.exit_after_pending),
        );
        let snapshot = store.snapshot().await;

        let chain_id = self.client.chain_id().await?;
        if let Some(journal) = snapshot.chain_id {
            if journal != chain_id {
                return Err(ValidationError::ChainIdMismatch {
                    journal,
                    node: chain_id,
                }
                .into());
            }
        }

        let accounts = self.client.accounts().await?;
        let default_sender = options
            .default_sender
            .or_else(|| accounts.first().copied())
            .ok_or(ValidationError::NoAccounts)?;

        let report = reconcile(
            &graph,
            &ResolveContext {
                state: &snapshot,
                parameters: &options.parameters,
                accounts: &accounts,
                default_sender,
            },
        )
        .into_result()?;
        for w in &report.warnings {
            warn!("{}", w);
        }

        let batches = batch_pending(&graph, &snapshot.completed())?;
        store.record(JournalMessage::RunStart { chain_id }).await?;
        info!(chain_id, batches = batches.len(), futures = graph.len(), "run started");
        store.emit(ExecutionEvent::RunStarted {
            chain_id,
            batches: batches.clone(),
        });

        let graph = Arc::new(graph);
        let processor = FutureProcessor {
            store: store.clone(),
            client: self.client.clone(),
            artifacts: self.artifacts.clone(),
            nonces: Arc::new(NonceManager::new(snapshot.max_nonces())),
            graph: graph.clone(),
            config: Arc::new(self.config.clone()),
            parameters: Arc::new(options.parameters.clone()),
            accounts: Arc::new(accounts),
            default_sender,
        };

        let mut outcomes: BTreeMap<FutureId, FutureOutcome> = snapshot
            .completed()
            .into_iter()
            .map(|id| (id, FutureOutcome::Finished(ExecutionStatus::Success)))
            .collect();

        for (index, batch) in batches.iter().enumerate() {
            if store.is_halted() {
                break;
            }
            let span = info_span!("batch", index);
            let finished = self
                .run_batch(&processor, &store, &graph, index, batch, &mut outcomes)
                .instrument(span)
                .await?;
            if !finished {
                break;
            }
        }

        let halted = store.is_halted();
        let outcomes = graph
            .ids()
            .iter()
            .map(|id| {
                let outcome = outcomes.remove(id).unwrap_or(FutureOutcome::NotReached);
                (id.clone(), outcome)
            })
            .collect();
        let report = RunReport {
            chain_id,
            batches,
            outcomes,
            halted,
            warnings: report.warnings,
        };
        info!(success = report.is_success(), halted, "run finished");
        Ok(report)
    }

    /// Run one batch to completion. Returns whether every member reached a
    /// terminal status.
    async fn run_batch(
        &self,
        processor: &FutureProcessor,
        store: &Arc<ExecutionStore>,
        graph: &Graph,
        index: usize,
        batch: &[FutureId],
        outcomes: &mut BTreeMap<FutureId, FutureOutcome>,
    ) -> Result<bool, EngineError> {
        info!(futures = batch.len(), "batch started");
        store.emit(ExecutionEvent::BatchStarted {
            index,
            futures: batch.to_vec(),
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = JoinSet::new();
        let snapshot = store.snapshot().await;

        // Unsent recorded nonces go out before a new allocation of the same
        // sender can queue behind them.
        let (holders, others): (Vec<&FutureId>, Vec<&FutureId>) = batch
            .iter()
            .partition(|id| snapshot.get(id).is_some_and(|s| s.holds_unsent_nonce()));
        for id in holders.into_iter().chain(others) {
            let dependencies = graph.dependencies(id);
            let failed = dependencies.iter().find(|d| {
                matches!(
                    snapshot.status_of(d),
                    ExecutionStatus::Failed | ExecutionStatus::Timeout
                )
            });
            if let Some(dependency) = failed {
                if snapshot.get(id).is_none() {
                    let kind = graph
                        .get(id)
                        .map(|f| f.kind())
                        .ok_or_else(|| EngineError::invariant(format!("{} is not in the graph", id)))?;
                    warn!(future = %id, dependency = %dependency, "dependency failed, not attempting");
                    store
                        .record(JournalMessage::ExecutionStateDependencyFailed {
                            future_id: id.clone(),
                            kind,
                            dependencies: dependencies.clone(),
                            dependency: dependency.clone(),
                        })
                        .await?;
                    store.emit(ExecutionEvent::FutureCompleted {
                        future_id: id.clone(),
                        status: ExecutionStatus::Failed,
                    });
                }
                outcomes.insert(id.clone(), FutureOutcome::Finished(ExecutionStatus::Failed));
                continue;
            }

            let processor = processor.clone();
            let semaphore = semaphore.clone();
            let id = id.clone();
            tasks.spawn(
                async move {
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => processor.process(&id).await,
                        Err(e) => Err(EngineError::invariant(e.to_string())),
                    };
                    (id, result)
                }
                .in_current_span(),
            );
        }

        let mut all_terminal = true;
        while let Some(joined) = tasks.join_next().await {
            let (id, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tasks.abort_all();
                    return Err(EngineError::invariant(format!("future task failed: {}", e)));
                }
            };
            let outcome = match result {
                Ok(status) if status.is_terminal() => FutureOutcome::Finished(status),
                Ok(_) => FutureOutcome::Interrupted {
                    message: "run halted".to_string(),
                },
                Err(e) if e.is_fatal() => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    warn!(future = %id, error = %e, "future interrupted");
                    FutureOutcome::Interrupted {
                        message: e.to_string(),
                    }
                }
            };
            if !matches!(outcome, FutureOutcome::Finished(_)) {
                all_terminal = false;
            }
            outcomes.insert(id, outcome);
        }

        store.emit(ExecutionEvent::BatchCompleted { index });
        info!(complete = all_terminal, "batch finished");
        Ok(all_terminal)
    }
}
