//! Per-future summary of a deployment.

use serde_json::{json, Value};

use hoist_core::{FutureId, FutureKind, Graph};

use crate::state::{DeploymentState, ExecutionState, ExecutionStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct FutureStatus {
    pub id: FutureId,
    pub kind: FutureKind,
    pub status: ExecutionStatus,
    /// Address, value or failure reason.
    pub result: Option<String>,
    pub interactions: usize,
    pub attempts: usize,
}

impl FutureStatus {
    fn recorded(state: &ExecutionState) -> Self {
        let result = match (state.success_value(), state.failure()) {
            (Some(value), _) => Some(value.to_string()),
            (None, Some(reason)) => Some(reason.to_string()),
            (None, None) if state.status == ExecutionStatus::Timeout => {
                Some("fee bumps exhausted".to_string())
            }
            _ => None,
        };
        FutureStatus {
            id: state.id.clone(),
            kind: state.kind,
            status: state.status,
            result,
            interactions: state.network_interactions.len(),
            attempts: state.attempt_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusReport {
    pub chain_id: Option<u64>,
    pub futures: Vec<FutureStatus>,
}

impl StatusReport {
    /// Every recorded future, plus graph futures without a state as
    /// UNSTARTED when a graph is given. Graph order first.
    pub fn new(state: &DeploymentState, graph: Option<&Graph>) -> Self {
        let mut futures = Vec::new();
        if let Some(graph) = graph {
            for future in graph.futures() {
                futures.push(match state.get(future.id()) {
                    Some(recorded) => FutureStatus::recorded(recorded),
                    None => FutureStatus {
                        id: future.id().clone(),
                        kind: future.kind(),
                        status: ExecutionStatus::Unstarted,
                        result: None,
                        interactions: 0,
                        attempts: 0,
                    },
                });
            }
        }
        for recorded in state.execution_states.values() {
            if graph.is_some_and(|g| g.contains(&recorded.id)) {
                continue;
            }
            futures.push(FutureStatus::recorded(recorded));
        }
        StatusReport {
            chain_id: state.chain_id,
            futures,
        }
    }

    pub fn count(&self, status: ExecutionStatus) -> usize {
        self.futures.iter().filter(|f| f.status == status).count()
    }

    pub fn to_json(&self) -> Value {
        let futures: Vec<Value> = self
            .futures
            .iter()
            .map(|f| {
                json!({
                    "attempts": f.attempts,
                    "id": f.id,
                    "interactions": f.interactions,
                    "kind": f.kind.as_str(),
                    "result": f.result,
                    "status": f.status.as_str(),
                })
            })
            .collect();
        json!({
            "chainId": self.chain_id,
            "futures": futures,
        })
    }

    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        match self.chain_id {
            Some(chain) => lines.push(format!("chain {}", chain)),
            None => lines.push("no run recorded".to_string()),
        }
        for f in &self.futures {
            let mut line = format!("{:<9} {} ({})", f.status.as_str(), f.id, f.kind);
            if let Some(result) = &f.result {
                line.push_str(&format!(": {}", result));
            }
            if f.attempts > 1 {
                line.push_str(&format!(" [{} attempts]", f.attempts));
            }
            lines.push(line);
        }
        lines.push(format!(
            "{} succeeded, {} failed, {} timed out, {} in progress, {} not started",
            self.count(ExecutionStatus::Success),
            self.count(ExecutionStatus::Failed),
            self.count(ExecutionStatus::Timeout),
            self.count(ExecutionStatus::Started),
            self.count(ExecutionStatus::Unstarted),
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_core::{Address, ModuleDescription};
    use hoist_journal::{ExecutionInputs, ExecutionResult, JournalMessage, ResultValue};

    fn graph() -> Graph {
        let module = json!({
            "id": "M",
            "futures": [
                { "id": "A", "type": "contract-at", "contractName": "Foo",
                  "address": Address::repeat_byte(0x33).to_string() },
                { "id": "B", "type": "contract-at", "contractName": "Foo",
                  "address": Address::repeat_byte(0x44).to_string() }
            ]
        });
        Graph::from_module(ModuleDescription::from_json_str(&module.to_string()).unwrap()).unwrap()
    }

    fn state() -> DeploymentState {
        let id = FutureId::from_raw("M#A");
        let address = Address::repeat_byte(0x33);
        DeploymentState::fold(&[
            JournalMessage::RunStart { chain_id: 31337 },
            JournalMessage::ExecutionStateInitialize {
                future_id: id.clone(),
                dependencies: Default::default(),
                inputs: ExecutionInputs::ContractAt {
                    artifact_id: id.clone(),
                    contract_name: "Foo".into(),
                    address,
                },
            },
            JournalMessage::ExecutionStateComplete {
                future_id: id,
                result: ExecutionResult::Success {
                    value: ResultValue::Address { address },
                },
            },
        ])
        .unwrap()
    }

    #[test]
    fn graph_futures_without_state_are_unstarted() {
        let report = StatusReport::new(&state(), Some(&graph()));
        assert_eq!(report.futures.len(), 2);
        assert_eq!(report.futures[0].status, ExecutionStatus::Success);
        assert_eq!(
            report.futures[0].result.as_deref(),
            Some(Address::repeat_byte(0x33).to_string().as_str())
        );
        assert_eq!(report.futures[1].status, ExecutionStatus::Unstarted);

        let json = report.to_json();
        assert_eq!(json["chainId"], json!(31337));
        assert_eq!(json["futures"][1]["status"], json!("UNSTARTED"));
        assert!(report.to_text().contains("1 succeeded, 0 failed"));
    }

    #[test]
    fn without_a_graph_only_recorded_futures_are_listed() {
        let report = StatusReport::new(&state(), None);
        assert_eq!(report.futures.len(), 1);
        assert_eq!(report.count(ExecutionStatus::Unstarted), 0);
    }
}
