//! Deployment state as a pure fold over journal messages.
//!
//! [`DeploymentState::apply`] is the only way state changes. Replaying the
//! same journal always folds to the same state, and a message that does not
//! fit the state it lands on is an invariant violation rather than
//! something to paper over.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use hoist_core::{Address, FutureId, FutureKind};
use hoist_journal::{
    ExecutionInputs, ExecutionResult, FailureReason, JournalMessage, NetworkInteraction,
    OnchainInteraction, ResultValue, StaticCallInteraction,
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Only ever reported for graph futures without a state.
    Unstarted,
    Started,
    Success,
    Failed,
    Timeout,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success | ExecutionStatus::Failed | ExecutionStatus::Timeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Unstarted => "UNSTARTED",
            ExecutionStatus::Started => "STARTED",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted progress of one future.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub id: FutureId,
    pub kind: FutureKind,
    pub status: ExecutionStatus,
    /// Dependencies as recorded when the state was created.
    pub dependencies: BTreeSet<FutureId>,
    /// `None` for futures failed because of a dependency; they never
    /// resolved their arguments.
    pub inputs: Option<ExecutionInputs>,
    pub network_interactions: Vec<NetworkInteraction>,
    pub result: Option<ExecutionResult>,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn last_interaction(&self) -> Option<&NetworkInteraction> {
        self.network_interactions.last()
    }

    pub fn success_value(&self) -> Option<&ResultValue> {
        match &self.result {
            Some(ExecutionResult::Success { value }) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.result {
            Some(ExecutionResult::Failed { reason }) => Some(reason),
            _ => None,
        }
    }

    /// The receipt of the confirmed onchain interaction, if any.
    pub fn confirmed_receipt(&self) -> Option<&hoist_journal::TransactionReceipt> {
        self.network_interactions.iter().rev().find_map(|i| match i {
            NetworkInteraction::Onchain(o) => o.receipt.as_ref(),
            NetworkInteraction::StaticCall(_) => None,
        })
    }

    /// Transaction attempts over every onchain interaction.
    pub fn attempt_count(&self) -> usize {
        self.network_interactions
            .iter()
            .map(|i| match i {
                NetworkInteraction::Onchain(o) => o.transactions.len(),
                NetworkInteraction::StaticCall(_) => 0,
            })
            .sum()
    }

    /// Whether a nonce was recorded for an onchain interaction that has no
    /// attempt yet.
    pub fn holds_unsent_nonce(&self) -> bool {
        self.network_interactions.iter().any(|i| {
            matches!(i, NetworkInteraction::Onchain(o) if o.nonce.is_some() && o.transactions.is_empty())
        })
    }

    fn onchain_mut(
        &mut self,
        interaction_id: u32,
    ) -> Result<&mut OnchainInteraction, EngineError> {
        let future = self.id.clone();
        match self.interaction_mut(interaction_id)? {
            NetworkInteraction::Onchain(o) => Ok(o),
            NetworkInteraction::StaticCall(_) => Err(EngineError::invariant(format!(
                "interaction {} of {} is not an onchain interaction",
                interaction_id, future
            ))),
        }
    }

    fn static_call_mut(
        &mut self,
        interaction_id: u32,
    ) -> Result<&mut StaticCallInteraction, EngineError> {
        let future = self.id.clone();
        match self.interaction_mut(interaction_id)? {
            NetworkInteraction::StaticCall(s) => Ok(s),
            NetworkInteraction::Onchain(_) => Err(EngineError::invariant(format!(
                "interaction {} of {} is not a static call",
                interaction_id, future
            ))),
        }
    }

    fn interaction_mut(
        &mut self,
        interaction_id: u32,
    ) -> Result<&mut NetworkInteraction, EngineError> {
        let future = self.id.clone();
        self.network_interactions
            .iter_mut()
            .find(|i| i.id() == interaction_id)
            .ok_or_else(|| {
                EngineError::invariant(format!(
                    "{} has no network interaction {}",
                    future, interaction_id
                ))
            })
    }
}

/// Everything the journal says about one deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentState {
    /// Chain of the first `RUN_START`.
    pub chain_id: Option<u64>,
    pub execution_states: BTreeMap<FutureId, ExecutionState>,
}

/// What one applied message replaced.
#[derive(Debug)]
pub(crate) struct Applied {
    chain_id: Option<u64>,
    entry: Option<(FutureId, Option<ExecutionState>)>,
}

impl DeploymentState {
    pub fn fold<'a>(
        messages: impl IntoIterator<Item = &'a JournalMessage>,
    ) -> Result<DeploymentState, EngineError> {
        let mut state = DeploymentState::default();
        for message in messages {
            state.apply(message)?;
        }
        Ok(state)
    }

    pub fn get(&self, id: &FutureId) -> Option<&ExecutionState> {
        self.execution_states.get(id)
    }

    pub fn status_of(&self, id: &FutureId) -> ExecutionStatus {
        self.get(id)
            .map_or(ExecutionStatus::Unstarted, |s| s.status)
    }

    /// Futures whose state is SUCCESS.
    pub fn completed(&self) -> BTreeSet<FutureId> {
        self.execution_states
            .values()
            .filter(|s| s.status == ExecutionStatus::Success)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Every successful future whose result is an address.
    pub fn deployed_addresses(&self) -> BTreeMap<FutureId, Address> {
        self.execution_states
            .values()
            .filter_map(|s| {
                s.success_value()
                    .and_then(ResultValue::address)
                    .map(|a| (s.id.clone(), a))
            })
            .collect()
    }

    /// Highest nonce recorded per sender.
    pub fn max_nonces(&self) -> BTreeMap<Address, u64> {
        let mut out: BTreeMap<Address, u64> = BTreeMap::new();
        for state in self.execution_states.values() {
            for interaction in &state.network_interactions {
                if let NetworkInteraction::Onchain(OnchainInteraction {
                    from,
                    nonce: Some(nonce),
                    ..
                }) = interaction
                {
                    let entry = out.entry(*from).or_insert(*nonce);
                    *entry = (*entry).max(*nonce);
                }
            }
        }
        out
    }

    /// Apply `message`, keeping what it replaced so [`revert`](Self::revert)
    /// can put it back. A rejected message leaves the state untouched.
    ///
    /// A message touches at most the chain id and one execution state, so
    /// only those are saved.
    pub(crate) fn apply_revertible(
        &mut self,
        message: &JournalMessage,
    ) -> Result<Applied, EngineError> {
        let saved = Applied {
            chain_id: self.chain_id,
            entry: message
                .future_id()
                .map(|id| (id.clone(), self.execution_states.get(id).cloned())),
        };
        match self.apply(message) {
            Ok(()) => Ok(saved),
            Err(err) => {
                self.revert(saved);
                Err(err)
            }
        }
    }

    pub(crate) fn revert(&mut self, saved: Applied) {
        self.chain_id = saved.chain_id;
        match saved.entry {
            Some((id, Some(state))) => {
                self.execution_states.insert(id, state);
            }
            Some((id, None)) => {
                self.execution_states.remove(&id);
            }
            None => {}
        }
    }

    /// Apply one message in place.
    ///
    /// On error the state may be partially updated; callers that need
    /// atomicity use [`apply_revertible`](Self::apply_revertible).
    pub fn apply(&mut self, message: &JournalMessage) -> Result<(), EngineError> {
        match message {
            JournalMessage::RunStart { chain_id } => {
                if self.chain_id.is_none() {
                    self.chain_id = Some(*chain_id);
                }
                Ok(())
            }

            JournalMessage::WipeApply { future_id } => self
                .execution_states
                .remove(future_id)
                .map(|_| ())
                .ok_or_else(|| {
                    EngineError::invariant(format!("cannot wipe {}: no execution state", future_id))
                }),

            JournalMessage::ExecutionStateInitialize {
                future_id,
                dependencies,
                inputs,
            } => {
                if self.execution_states.contains_key(future_id) {
                    return Err(EngineError::invariant(format!(
                        "{} is already initialized",
                        future_id
                    )));
                }
                self.execution_states.insert(
                    future_id.clone(),
                    ExecutionState {
                        id: future_id.clone(),
                        kind: inputs.kind(),
                        status: ExecutionStatus::Started,
                        dependencies: dependencies.clone(),
                        inputs: Some(inputs.clone()),
                        network_interactions: Vec::new(),
                        result: None,
                    },
                );
                Ok(())
            }

            JournalMessage::ExecutionStateDependencyFailed {
                future_id,
                kind,
                dependencies,
                dependency,
            } => {
                if self.execution_states.contains_key(future_id) {
                    return Err(EngineError::invariant(format!(
                        "{} already has a state and cannot fail on a dependency",
                        future_id
                    )));
                }
                self.execution_states.insert(
                    future_id.clone(),
                    ExecutionState {
                        id: future_id.clone(),
                        kind: *kind,
                        status: ExecutionStatus::Failed,
                        dependencies: dependencies.clone(),
                        inputs: None,
                        network_interactions: Vec::new(),
                        result: Some(ExecutionResult::Failed {
                            reason: FailureReason::DependencyFailed {
                                dependency: dependency.clone(),
                            },
                        }),
                    },
                );
                Ok(())
            }

            JournalMessage::NetworkInteractionRequest {
                future_id,
                network_interaction,
            } => {
                let state = self.started_mut(future_id, message)?;
                if state
                    .network_interactions
                    .iter()
                    .any(|i| i.id() == network_interaction.id())
                {
                    return Err(EngineError::invariant(format!(
                        "{} already has network interaction {}",
                        future_id,
                        network_interaction.id()
                    )));
                }
                state
                    .network_interactions
                    .push(network_interaction.clone().into());
                Ok(())
            }

            JournalMessage::TransactionPrepareSend {
                future_id,
                network_interaction_id,
                nonce,
            } => {
                let interaction = self
                    .started_mut(future_id, message)?
                    .onchain_mut(*network_interaction_id)?;
                if let Some(existing) = interaction.nonce {
                    if existing != *nonce {
                        return Err(EngineError::invariant(format!(
                            "{} interaction {} already holds nonce {}",
                            future_id, network_interaction_id, existing
                        )));
                    }
                }
                interaction.nonce = Some(*nonce);
                Ok(())
            }

            JournalMessage::TransactionSend {
                future_id,
                network_interaction_id,
                transaction,
            } => {
                let interaction = self
                    .started_mut(future_id, message)?
                    .onchain_mut(*network_interaction_id)?;
                if interaction.nonce.is_none() {
                    return Err(EngineError::invariant(format!(
                        "{} sent a transaction before allocating a nonce",
                        future_id
                    )));
                }
                let expected = interaction.transactions.len() as u32;
                if transaction.attempt != expected {
                    return Err(EngineError::invariant(format!(
                        "{} attempt {} recorded out of order (expected {})",
                        future_id, transaction.attempt, expected
                    )));
                }
                interaction.transactions.push(transaction.clone());
                interaction.should_bump_fees = false;
                interaction.dropped = false;
                Ok(())
            }

            JournalMessage::TransactionConfirm {
                future_id,
                network_interaction_id,
                hash,
                receipt,
            } => {
                let interaction = self
                    .started_mut(future_id, message)?
                    .onchain_mut(*network_interaction_id)?;
                if !interaction.transactions.iter().any(|t| t.hash == *hash) {
                    return Err(EngineError::invariant(format!(
                        "{} confirmed unknown transaction {}",
                        future_id, hash
                    )));
                }
                interaction.receipt = Some(receipt.clone());
                Ok(())
            }

            JournalMessage::StaticCallComplete {
                future_id,
                network_interaction_id,
                result,
            } => {
                let interaction = self
                    .started_mut(future_id, message)?
                    .static_call_mut(*network_interaction_id)?;
                interaction.result = Some(result.clone());
                Ok(())
            }

            JournalMessage::OnchainInteractionBumpFees {
                future_id,
                network_interaction_id,
            } => {
                self.started_mut(future_id, message)?
                    .onchain_mut(*network_interaction_id)?
                    .should_bump_fees = true;
                Ok(())
            }

            JournalMessage::OnchainInteractionDropped {
                future_id,
                network_interaction_id,
            } => {
                self.started_mut(future_id, message)?
                    .onchain_mut(*network_interaction_id)?
                    .dropped = true;
                Ok(())
            }

            JournalMessage::OnchainInteractionTimeout {
                future_id,
                network_interaction_id,
            } => {
                let state = self.started_mut(future_id, message)?;
                state.onchain_mut(*network_interaction_id)?;
                state.status = ExecutionStatus::Timeout;
                Ok(())
            }

            JournalMessage::ExecutionStateComplete { future_id, result } => {
                let state = self.started_mut(future_id, message)?;
                state.status = if result.is_success() {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::Failed
                };
                state.result = Some(result.clone());
                Ok(())
            }
        }
    }

    /// The state a future-level message targets; it must exist and still
    /// be running.
    fn started_mut(
        &mut self,
        future_id: &FutureId,
        message: &JournalMessage,
    ) -> Result<&mut ExecutionState, EngineError> {
        let state = self.execution_states.get_mut(future_id).ok_or_else(|| {
            EngineError::invariant(format!(
                "{} for {} which has no execution state",
                message.type_name(),
                future_id
            ))
        })?;
        if state.is_terminal() {
            return Err(EngineError::invariant(format!(
                "{} for {} which is already {}",
                message.type_name(),
                future_id,
                state.status
            )));
        }
        Ok(state)
    }
}
