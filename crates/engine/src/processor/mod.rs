//! Driving one future from UNSTARTED to a terminal status.
//!
//! [`next_action`] is a pure function of the execution state; the
//! [`FutureProcessor`] performs that action, records its outcome in the
//! journal, and asks again until the future is terminal, the run halts, or
//! an error interrupts it.

mod resolve;
pub mod strategy;

use std::sync::Arc;

use hoist_core::abi::describe_unknown_revert;
use hoist_core::{
    Address, ArtifactResolver, Bytes, ContractAbi, Future, FutureId, Graph, ModuleParameters,
};
use hoist_journal::{
    ExecutionInputs, ExecutionResult, FailureReason, JournalMessage, NetworkInteraction,
    OnchainInteraction, ResultValue, StaticCallInteraction, Transaction,
};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::ExecutionEvent;
use crate::network::fees::{bumped_fees, initial_fees, resubmission_fees};
use crate::network::{
    check_onchain, now_millis, BlockTag, CallRequest, JsonRpcClient, MonitorOutcome,
    NonceManager, TransactionRequest,
};
use crate::state::{ExecutionState, ExecutionStatus};
use crate::store::ExecutionStore;

pub use resolve::{
    check_parameters, resolve_argument, resolve_inputs, ResolveContext, ResolveError,
};
use strategy::{StrategyContext, StrategyStep};

/// What a future needs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// No state yet: resolve inputs and record them.
    Initialize,
    /// Terminal.
    Stop,
    /// Ask the strategy for the next interaction or the result.
    RunStrategy,
    SendTransaction(u32),
    MonitorTransaction(u32),
    QueryStaticCall(u32),
}

pub fn next_action(state: Option<&ExecutionState>) -> NextAction {
    let Some(state) = state else {
        return NextAction::Initialize;
    };
    if state.is_terminal() {
        return NextAction::Stop;
    }
    match state.last_interaction() {
        None => NextAction::RunStrategy,
        Some(interaction) if interaction.is_finished() => NextAction::RunStrategy,
        Some(NetworkInteraction::Onchain(onchain)) => {
            if onchain.nonce.is_none()
                || onchain.should_bump_fees
                || onchain.dropped
                || onchain.transactions.is_empty()
            {
                NextAction::SendTransaction(onchain.id)
            } else {
                NextAction::MonitorTransaction(onchain.id)
            }
        }
        Some(NetworkInteraction::StaticCall(call)) => NextAction::QueryStaticCall(call.id),
    }
}

/// The future whose artifact supplies the ABI for these inputs.
fn artifact_id(inputs: &ExecutionInputs) -> Option<&FutureId> {
    match inputs {
        ExecutionInputs::ContractDeployment { artifact_id, .. }
        | ExecutionInputs::LibraryDeployment { artifact_id, .. }
        | ExecutionInputs::ContractAt { artifact_id, .. }
        | ExecutionInputs::Call { artifact_id, .. }
        | ExecutionInputs::StaticCall { artifact_id, .. }
        | ExecutionInputs::ReadEventArgument { artifact_id, .. }
        | ExecutionInputs::EncodeFunctionCall { artifact_id, .. } => Some(artifact_id),
        ExecutionInputs::SendData { .. } => None,
    }
}

/// Processes futures of one run. Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct FutureProcessor {
    pub(crate) store: Arc<ExecutionStore>,
    pub(crate) client: Arc<dyn JsonRpcClient>,
    pub(crate) artifacts: Arc<dyn ArtifactResolver>,
    pub(crate) nonces: Arc<NonceManager>,
    pub(crate) graph: Arc<Graph>,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) parameters: Arc<ModuleParameters>,
    pub(crate) accounts: Arc<Vec<Address>>,
    pub(crate) default_sender: Address,
}

impl FutureProcessor {
    /// Run `id` until it is terminal or the run halts. Returns the status
    /// it was left in.
    pub async fn process(&self, id: &FutureId) -> Result<ExecutionStatus, EngineError> {
        let future = self
            .graph
            .get(id)
            .ok_or_else(|| EngineError::invariant(format!("{} is not in the graph", id)))?;

        loop {
            let state = self.store.execution_state(id).await;
            if self.store.is_halted() {
                return Ok(state.map_or(ExecutionStatus::Unstarted, |s| s.status));
            }
            let action = next_action(state.as_ref());
            debug!(future = %id, ?action, "next action");
            match (action, state) {
                (NextAction::Initialize, _) => self.initialize(future).await?,
                (NextAction::Stop, Some(state)) => return Ok(state.status),
                (NextAction::RunStrategy, Some(state)) => self.run_strategy(&state).await?,
                (NextAction::SendTransaction(ni), Some(state)) => {
                    let onchain = onchain(&state, ni)?;
                    self.send_transaction(&state, onchain).await?
                }
                (NextAction::MonitorTransaction(ni), Some(state)) => {
                    let onchain = onchain(&state, ni)?;
                    self.monitor(&state, onchain).await?
                }
                (NextAction::QueryStaticCall(ni), Some(state)) => {
                    let call = static_call(&state, ni)?;
                    self.query_static_call(&state, call).await?
                }
                (_, None) => {
                    return Err(EngineError::invariant(format!(
                        "{} lost its execution state",
                        id
                    )))
                }
            }
        }
    }

    // ──────────────────────────────────────────────
    // Initialize
    // ──────────────────────────────────────────────

    async fn initialize(&self, future: &Future) -> Result<(), EngineError> {
        let id = future.id();
        let snapshot = self.store.snapshot().await;
        let ctx = ResolveContext {
            state: &snapshot,
            parameters: &self.parameters,
            accounts: &self.accounts,
            default_sender: self.default_sender,
        };
        let inputs = resolve_inputs(future, &ctx).map_err(|e| e.into_engine_error(id))?;

        if let ExecutionInputs::ContractDeployment { contract_name, .. }
        | ExecutionInputs::LibraryDeployment { contract_name, .. }
        | ExecutionInputs::ContractAt { contract_name, .. } = &inputs
        {
            let artifact = self.artifacts.load_artifact(contract_name)?;
            let loader = self.store.loader();
            loader.store_artifact(id, &artifact).await?;
            if let Some(build_info) = self.artifacts.get_build_info(contract_name)? {
                loader.store_build_info(contract_name, &build_info).await?;
            }
        }

        self.store
            .record(JournalMessage::ExecutionStateInitialize {
                future_id: id.clone(),
                dependencies: self.graph.dependencies(id),
                inputs: inputs.clone(),
            })
            .await?;
        info!(future = %id, kind = %future.kind(), "future started");
        self.store
            .emit(ExecutionEvent::FutureStarted { future_id: id.clone() });

        let immediate = match &inputs {
            ExecutionInputs::ContractAt { address, .. } => Some(ExecutionResult::Success {
                value: ResultValue::Address { address: *address },
            }),
            ExecutionInputs::EncodeFunctionCall {
                artifact_id,
                function_name,
                args,
            } => {
                let abi = self.abi_for(artifact_id).await?;
                Some(strategy::encode_function_call(&abi, function_name, args))
            }
            ExecutionInputs::ReadEventArgument {
                artifact_id,
                emitter_address,
                tx_hash,
                event_name,
                name_or_index,
                event_index,
            } => {
                let abi = self.abi_for(artifact_id).await?;
                let receipt = snapshot
                    .execution_states
                    .values()
                    .filter_map(|s| s.confirmed_receipt())
                    .find(|r| r.transaction_hash == *tx_hash)
                    .ok_or_else(|| {
                        EngineError::invariant(format!("{} reads an unknown transaction", id))
                    })?;
                Some(strategy::read_event_argument(
                    &abi,
                    receipt,
                    *emitter_address,
                    event_name,
                    *event_index,
                    name_or_index,
                ))
            }
            _ => None,
        };
        if let Some(result) = immediate {
            self.complete(id, result).await?;
        }
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Strategy
    // ──────────────────────────────────────────────

    async fn run_strategy(&self, state: &ExecutionState) -> Result<(), EngineError> {
        let inputs = state.inputs.as_ref().ok_or_else(|| {
            EngineError::invariant(format!("{} has no inputs to execute", state.id))
        })?;

        // A confirmed onchain interaction completes from its receipt alone.
        let needs_material = !matches!(
            state.last_interaction(),
            Some(NetworkInteraction::Onchain(_))
        );
        let mut abi = None;
        let mut bytecode = None;
        if needs_material {
            match inputs {
                ExecutionInputs::ContractDeployment {
                    artifact_id,
                    libraries,
                    ..
                }
                | ExecutionInputs::LibraryDeployment {
                    artifact_id,
                    libraries,
                    ..
                } => {
                    let artifact = self.artifact_for(artifact_id).await?;
                    abi = Some(artifact.contract_abi()?);
                    bytecode = Some(artifact.link(libraries)?);
                }
                ExecutionInputs::Call { artifact_id, .. }
                | ExecutionInputs::StaticCall { artifact_id, .. } => {
                    abi = Some(self.abi_for(artifact_id).await?);
                }
                _ => {}
            }
        }

        let ctx = StrategyContext {
            abi: abi.as_ref(),
            bytecode: bytecode.as_ref(),
        };
        match strategy::next_step(state, inputs, &ctx)? {
            StrategyStep::Request(request) => {
                self.store
                    .record(JournalMessage::NetworkInteractionRequest {
                        future_id: state.id.clone(),
                        network_interaction: request,
                    })
                    .await
            }
            StrategyStep::Complete(result) => self.complete(&state.id, result).await,
        }
    }

    async fn complete(&self, id: &FutureId, result: ExecutionResult) -> Result<(), EngineError> {
        let status = if result.is_success() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        match &result {
            ExecutionResult::Success { value } => {
                info!(future = %id, result = %value, "future succeeded")
            }
            ExecutionResult::Failed { reason } => {
                warn!(future = %id, reason = %reason, "future failed")
            }
        }
        self.store
            .record(JournalMessage::ExecutionStateComplete {
                future_id: id.clone(),
                result,
            })
            .await?;
        self.store.emit(ExecutionEvent::FutureCompleted {
            future_id: id.clone(),
            status,
        });
        Ok(())
    }

    async fn fail(&self, id: &FutureId, reason: FailureReason) -> Result<(), EngineError> {
        self.complete(id, ExecutionResult::Failed { reason }).await
    }

    // ──────────────────────────────────────────────
    // Sending
    // ──────────────────────────────────────────────

    async fn send_transaction(
        &self,
        state: &ExecutionState,
        onchain: &OnchainInteraction,
    ) -> Result<(), EngineError> {
        let id = &state.id;
        let client = self.client.as_ref();
        let call = CallRequest {
            from: onchain.from,
            to: onchain.to,
            data: onchain.data.clone(),
            value: onchain.value,
        };

        let (nonce, gas_limit) = match onchain.nonce {
            None => {
                let simulation = client.call(&call).await?;
                if !simulation.success {
                    let message = self.revert_reason(state, &simulation.return_data).await;
                    return self
                        .fail(id, FailureReason::SimulationFailed { message })
                        .await;
                }
                // Estimated before allocating, so a revert here leaves no
                // gap in the sender's nonces.
                let Some(gas_limit) = self.estimate_gas(state, &call).await? else {
                    return Ok(());
                };
                let nonce = self.nonces.allocate(client, onchain.from).await?;
                self.store
                    .record(JournalMessage::TransactionPrepareSend {
                        future_id: id.clone(),
                        network_interaction_id: onchain.id,
                        nonce,
                    })
                    .await?;
                (nonce, gas_limit)
            }
            Some(nonce) => {
                if onchain.transactions.is_empty() {
                    // Allocated before an interruption but never recorded as
                    // sent; if the slot is gone the hash is unknowable.
                    let mined = client
                        .get_transaction_count(&onchain.from, BlockTag::Latest)
                        .await?;
                    if mined > nonce {
                        warn!(future = %id, sender = %onchain.from, nonce, "nonce consumed before the first recorded attempt");
                        return self
                            .fail(
                                id,
                                FailureReason::NonceConsumedExternally {
                                    sender: onchain.from,
                                    nonce,
                                },
                            )
                            .await;
                    }
                }
                let Some(gas_limit) = self.estimate_gas(state, &call).await? else {
                    return Ok(());
                };
                (nonce, gas_limit)
            }
        };

        let network = client.network_fees().await?;
        let cap = self.config.max_fee_per_gas_cap;
        let fees = match onchain.last_transaction() {
            None => initial_fees(&network, cap),
            Some(last) if onchain.should_bump_fees => {
                bumped_fees(&last.fees, &network, self.config.fee_bump_percent, cap)
            }
            Some(last) => resubmission_fees(&last.fees, &network, cap),
        };

        let request = TransactionRequest {
            from: onchain.from,
            to: onchain.to,
            data: onchain.data.clone(),
            value: onchain.value,
            nonce,
            gas_limit,
            fees,
        };
        let attempt = onchain.transactions.len() as u32;
        let hash = match client.send_transaction(&request).await {
            Ok(hash) => hash,
            Err(err) if err.is_transient() => return Err(err.into()),
            Err(err) if attempt == 0 => {
                // Nothing reached the mempool. The recorded nonce is resent on
                // the next run; until then no later nonce of this sender could
                // be mined.
                warn!(future = %id, sender = %onchain.from, nonce, error = %err, "first send rejected, holding sender until the next run");
                self.nonces.hold(onchain.from, nonce).await;
                return Err(err.into());
            }
            Err(err) => {
                // The earlier attempts may still be mined; check before
                // giving the interaction up.
                warn!(future = %id, nonce, attempt, error = %err, "replacement rejected");
                let outcome =
                    check_onchain(client, onchain, &self.config, now_millis()).await?;
                return match outcome {
                    MonitorOutcome::Pending
                    | MonitorOutcome::BumpFees
                    | MonitorOutcome::TimedOut => self.time_out(id, onchain.id).await,
                    outcome => self.apply_outcome(id, onchain, outcome).await,
                };
            }
        };

        self.store
            .record(JournalMessage::TransactionSend {
                future_id: id.clone(),
                network_interaction_id: onchain.id,
                transaction: Transaction {
                    hash,
                    fees,
                    attempt,
                    sent_at: now_millis(),
                },
            })
            .await?;
        info!(future = %id, %hash, nonce, attempt, fees = %fees, "transaction sent");
        self.store.emit(ExecutionEvent::TransactionSent {
            future_id: id.clone(),
            hash,
            nonce,
            attempt,
        });
        if onchain.should_bump_fees {
            self.store.emit(ExecutionEvent::FeesBumped {
                future_id: id.clone(),
                attempt,
            });
        }
        Ok(())
    }

    /// Gas for `call`, or `None` after completing the future FAILED because
    /// the estimate reverted.
    async fn estimate_gas(
        &self,
        state: &ExecutionState,
        call: &CallRequest,
    ) -> Result<Option<u64>, EngineError> {
        match self.client.estimate_gas(call).await {
            Ok(gas) => Ok(Some(gas)),
            Err(err) => match err.revert_data() {
                Some(data) => {
                    let message = self.revert_reason(state, &data).await;
                    self.fail(&state.id, FailureReason::SimulationFailed { message })
                        .await?;
                    Ok(None)
                }
                None => Err(err.into()),
            },
        }
    }

    // ──────────────────────────────────────────────
    // Monitoring
    // ──────────────────────────────────────────────

    async fn monitor(
        &self,
        state: &ExecutionState,
        onchain: &OnchainInteraction,
    ) -> Result<(), EngineError> {
        let outcome =
            check_onchain(self.client.as_ref(), onchain, &self.config, now_millis()).await?;
        self.apply_outcome(&state.id, onchain, outcome).await
    }

    async fn apply_outcome(
        &self,
        id: &FutureId,
        onchain: &OnchainInteraction,
        outcome: MonitorOutcome,
    ) -> Result<(), EngineError> {
        match outcome {
            MonitorOutcome::Confirmed { hash, receipt } => {
                self.confirm(id, onchain.id, hash, receipt).await
            }
            MonitorOutcome::WaitingConfirmations {
                hash,
                confirmations,
            } => {
                debug!(future = %id, %hash, confirmations, "waiting for confirmations");
                tokio::time::sleep(self.config.polling_interval()).await;
                Ok(())
            }
            MonitorOutcome::Pending => {
                tokio::time::sleep(self.config.polling_interval()).await;
                Ok(())
            }
            MonitorOutcome::BumpFees => {
                warn!(future = %id, attempts = onchain.transactions.len(), "transaction pending too long, bumping fees");
                self.store
                    .record(JournalMessage::OnchainInteractionBumpFees {
                        future_id: id.clone(),
                        network_interaction_id: onchain.id,
                    })
                    .await
            }
            MonitorOutcome::TimedOut => self.time_out(id, onchain.id).await,
            MonitorOutcome::Dropped => {
                warn!(future = %id, nonce = ?onchain.nonce, "transaction dropped by the node, resubmitting");
                self.store
                    .record(JournalMessage::OnchainInteractionDropped {
                        future_id: id.clone(),
                        network_interaction_id: onchain.id,
                    })
                    .await
            }
            MonitorOutcome::ReplacedExternally { nonce } => {
                warn!(future = %id, sender = %onchain.from, nonce, "nonce mined by a foreign transaction");
                self.fail(
                    id,
                    FailureReason::NonceConsumedExternally {
                        sender: onchain.from,
                        nonce,
                    },
                )
                .await
            }
        }
    }

    async fn confirm(
        &self,
        id: &FutureId,
        interaction_id: u32,
        hash: hoist_core::TxHash,
        receipt: hoist_journal::TransactionReceipt,
    ) -> Result<(), EngineError> {
        let block_number = receipt.block_number;
        self.store
            .record(JournalMessage::TransactionConfirm {
                future_id: id.clone(),
                network_interaction_id: interaction_id,
                hash,
                receipt,
            })
            .await?;
        info!(future = %id, %hash, block = block_number, "transaction confirmed");
        self.store.emit(ExecutionEvent::TransactionConfirmed {
            future_id: id.clone(),
            hash,
            block_number,
        });
        Ok(())
    }

    async fn time_out(&self, id: &FutureId, interaction_id: u32) -> Result<(), EngineError> {
        warn!(future = %id, "transaction timed out");
        self.store
            .record(JournalMessage::OnchainInteractionTimeout {
                future_id: id.clone(),
                network_interaction_id: interaction_id,
            })
            .await?;
        self.store.emit(ExecutionEvent::FutureCompleted {
            future_id: id.clone(),
            status: ExecutionStatus::Timeout,
        });
        Ok(())
    }

    async fn query_static_call(
        &self,
        state: &ExecutionState,
        call: &StaticCallInteraction,
    ) -> Result<(), EngineError> {
        let result = self
            .client
            .call(&CallRequest {
                from: call.from,
                to: Some(call.to),
                data: call.data.clone(),
                value: call.value,
            })
            .await?;
        self.store
            .record(JournalMessage::StaticCallComplete {
                future_id: state.id.clone(),
                network_interaction_id: call.id,
                result,
            })
            .await
    }

    // ──────────────────────────────────────────────
    // Contract material
    // ──────────────────────────────────────────────

    /// The artifact stored when `artifact_id` was initialized, falling back
    /// to the resolver by the future's contract name.
    async fn artifact_for(&self, artifact_id: &FutureId) -> Result<hoist_core::Artifact, EngineError> {
        if let Some(artifact) = self.store.loader().load_artifact(artifact_id).await? {
            return Ok(artifact);
        }
        let name = self
            .graph
            .get(artifact_id)
            .and_then(Future::contract_name)
            .ok_or_else(|| {
                EngineError::invariant(format!("no artifact recorded for {}", artifact_id))
            })?;
        Ok(self.artifacts.load_artifact(name)?)
    }

    async fn abi_for(&self, artifact_id: &FutureId) -> Result<ContractAbi, EngineError> {
        Ok(self.artifact_for(artifact_id).await?.contract_abi()?)
    }

    async fn revert_reason(&self, state: &ExecutionState, data: &Bytes) -> String {
        let artifact = state.inputs.as_ref().and_then(artifact_id);
        if let Some(artifact_id) = artifact {
            if let Ok(abi) = self.abi_for(artifact_id).await {
                return abi.decode_revert(&data[..]);
            }
        }
        describe_unknown_revert(&data[..])
    }
}

fn onchain(state: &ExecutionState, interaction_id: u32) -> Result<&OnchainInteraction, EngineError> {
    state
        .network_interactions
        .iter()
        .find_map(|i| match i {
            NetworkInteraction::Onchain(o) if o.id == interaction_id => Some(o),
            _ => None,
        })
        .ok_or_else(|| {
            EngineError::invariant(format!(
                "{} has no onchain interaction {}",
                state.id, interaction_id
            ))
        })
}

fn static_call(
    state: &ExecutionState,
    interaction_id: u32,
) -> Result<&StaticCallInteraction, EngineError> {
    state
        .network_interactions
        .iter()
        .find_map(|i| match i {
            NetworkInteraction::StaticCall(s) if s.id == interaction_id => Some(s),
            _ => None,
        })
        .ok_or_else(|| {
            EngineError::invariant(format!(
                "{} has no static call {}",
                state.id, interaction_id
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_core::{FutureKind, Wei, B256};
    use hoist_journal::{NetworkFees, RawStaticCallResult};

    fn started() -> ExecutionState {
        ExecutionState {
            id: FutureId::from_raw("M#A"),
            kind: FutureKind::Call,
            status: ExecutionStatus::Started,
            dependencies: Default::default(),
            inputs: None,
            network_interactions: Vec::new(),
            result: None,
        }
    }

    fn onchain_interaction() -> OnchainInteraction {
        OnchainInteraction {
            id: 1,
            to: Some(Address::repeat_byte(0x22)),
            data: Bytes::default(),
            value: Wei::ZERO,
            from: Address::repeat_byte(0x11),
            nonce: None,
            transactions: Vec::new(),
            receipt: None,
            should_bump_fees: false,
            dropped: false,
        }
    }

    fn attempt() -> Transaction {
        Transaction {
            hash: B256::new([1; 32]),
            fees: NetworkFees::Legacy { gas_price: Wei::new(1) },
            attempt: 0,
            sent_at: 0,
        }
    }

    fn with(interaction: NetworkInteraction) -> ExecutionState {
        let mut state = started();
        state.network_interactions.push(interaction);
        state
    }

    #[test]
    fn no_state_initializes_and_terminal_stops() {
        assert_eq!(next_action(None), NextAction::Initialize);
        let mut done = started();
        done.status = ExecutionStatus::Timeout;
        assert_eq!(next_action(Some(&done)), NextAction::Stop);
        assert_eq!(next_action(Some(&started())), NextAction::RunStrategy);
    }

    #[test]
    fn onchain_interaction_actions() {
        let fresh = onchain_interaction();
        assert_eq!(
            next_action(Some(&with(NetworkInteraction::Onchain(fresh.clone())))),
            NextAction::SendTransaction(1)
        );

        let mut allocated = fresh.clone();
        allocated.nonce = Some(4);
        assert_eq!(
            next_action(Some(&with(NetworkInteraction::Onchain(allocated.clone())))),
            NextAction::SendTransaction(1),
            "nonce without attempts resends"
        );

        let mut pending = allocated.clone();
        pending.transactions.push(attempt());
        assert_eq!(
            next_action(Some(&with(NetworkInteraction::Onchain(pending.clone())))),
            NextAction::MonitorTransaction(1)
        );

        let mut bump = pending.clone();
        bump.should_bump_fees = true;
        assert_eq!(
            next_action(Some(&with(NetworkInteraction::Onchain(bump)))),
            NextAction::SendTransaction(1)
        );

        let mut dropped = pending.clone();
        dropped.dropped = true;
        assert_eq!(
            next_action(Some(&with(NetworkInteraction::Onchain(dropped)))),
            NextAction::SendTransaction(1)
        );

        let mut confirmed = pending;
        confirmed.receipt = Some(hoist_journal::TransactionReceipt {
            transaction_hash: B256::new([1; 32]),
            block_number: 1,
            block_hash: B256::default(),
            status: true,
            contract_address: None,
            logs: vec![],
        });
        assert_eq!(
            next_action(Some(&with(NetworkInteraction::Onchain(confirmed)))),
            NextAction::RunStrategy
        );
    }

    #[test]
    fn static_call_actions() {
        let mut call = StaticCallInteraction {
            id: 1,
            to: Address::repeat_byte(0x22),
            data: Bytes::default(),
            value: Wei::ZERO,
            from: Address::repeat_byte(0x11),
            result: None,
        };
        assert_eq!(
            next_action(Some(&with(NetworkInteraction::StaticCall(call.clone())))),
            NextAction::QueryStaticCall(1)
        );
        call.result = Some(RawStaticCallResult {
            success: true,
            return_data: Bytes::default(),
        });
        assert_eq!(
            next_action(Some(&with(NetworkInteraction::StaticCall(call)))),
            NextAction::RunStrategy
        );
    }
}
