//! Comparing a module graph against the execution states of a prior run.
//!
//! Every future of the graph is classified before the run touches the
//! network. The comparison is argument-level: a future's recorded inputs
//! are diffed against the inputs it resolves to now, so a changed
//! dependency set alone never forces re-execution.

use serde_json::{json, Value};

use hoist_core::{Future, FutureId, FutureKind, Graph};

use crate::error::ValidationError;
use crate::processor::{resolve_inputs, ResolveContext, ResolveError};
use crate::state::ExecutionStatus;

/// How a future relates to what the journal already holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Not recorded yet.
    New,
    /// Recorded, terminal SUCCESS, same inputs. Skipped.
    ResumableUnchanged,
    /// Recorded, still STARTED, same inputs. Resumes from its last interaction.
    ResumableInProgress,
    /// Recorded with a different kind or different resolved inputs.
    Conflicting { fields: Vec<FieldDiff> },
    /// Recorded as FAILED or TIMEOUT; has to be wiped before it can run again.
    PreviouslyFailed { status: ExecutionStatus },
    /// Recorded, but its inputs can no longer be resolved (e.g. a wiped
    /// dependency).
    Unresolvable { message: String },
}

impl Reconciliation {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Reconciliation::Conflicting { .. }
                | Reconciliation::PreviouslyFailed { .. }
                | Reconciliation::Unresolvable { .. }
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reconciliation::New => "new",
            Reconciliation::ResumableUnchanged => "unchanged",
            Reconciliation::ResumableInProgress => "in-progress",
            Reconciliation::Conflicting { .. } => "conflicting",
            Reconciliation::PreviouslyFailed { .. } => "previously-failed",
            Reconciliation::Unresolvable { .. } => "unresolvable",
        }
    }
}

/// A single field-level difference between recorded and current inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FutureReconciliation {
    pub id: FutureId,
    pub kind: FutureKind,
    pub result: Reconciliation,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconciliationReport {
    pub futures: Vec<FutureReconciliation>,
    /// Non-fatal findings, such as recorded futures missing from the graph.
    pub warnings: Vec<String>,
}

impl ReconciliationReport {
    pub fn is_ok(&self) -> bool {
        self.futures.iter().all(|f| !f.result.is_fatal())
    }

    pub fn get(&self, id: &FutureId) -> Option<&Reconciliation> {
        self.futures.iter().find(|f| &f.id == id).map(|f| &f.result)
    }

    /// One line per fatal finding.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for f in &self.futures {
            match &f.result {
                Reconciliation::Conflicting { fields } => {
                    for d in fields {
                        issues.push(format!(
                            "{}: {} changed from {} to {}",
                            f.id,
                            d.field,
                            compact(&d.before),
                            compact(&d.after)
                        ));
                    }
                }
                Reconciliation::PreviouslyFailed { status } => issues.push(format!(
                    "{}: recorded as {}; wipe it to run it again",
                    f.id, status
                )),
                Reconciliation::Unresolvable { message } => {
                    issues.push(format!("{}: {}", f.id, message))
                }
                _ => {}
            }
        }
        issues
    }

    /// The report itself when nothing is fatal, a validation error listing
    /// every issue otherwise.
    pub fn into_result(self) -> Result<ReconciliationReport, ValidationError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(ValidationError::Reconciliation {
                issues: self.issues(),
            })
        }
    }

    pub fn to_json(&self) -> Value {
        let futures: Vec<Value> = self
            .futures
            .iter()
            .map(|f| {
                let mut entry = json!({
                    "id": f.id,
                    "kind": f.kind.as_str(),
                    "result": f.result.as_str(),
                });
                match &f.result {
                    Reconciliation::Conflicting { fields } => {
                        let fields: Vec<Value> = fields
                            .iter()
                            .map(|d| {
                                json!({
                                    "after": d.after,
                                    "before": d.before,
                                    "field": d.field,
                                })
                            })
                            .collect();
                        entry["fields"] = Value::Array(fields);
                    }
                    Reconciliation::PreviouslyFailed { status } => {
                        entry["status"] = json!(status.as_str());
                    }
                    Reconciliation::Unresolvable { message } => {
                        entry["message"] = json!(message);
                    }
                    _ => {}
                }
                entry
            })
            .collect();
        json!({
            "futures": futures,
            "ok": self.is_ok(),
            "warnings": self.warnings,
        })
    }

    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        for f in &self.futures {
            let marker = match &f.result {
                Reconciliation::New => "+",
                Reconciliation::ResumableUnchanged => "=",
                Reconciliation::ResumableInProgress => ">",
                _ => "!",
            };
            lines.push(format!("{} {} {} ({})", marker, f.kind, f.id, f.result.as_str()));
            if let Reconciliation::Conflicting { fields } = &f.result {
                for d in fields {
                    lines.push(format!(
                        "    {}: {} -> {}",
                        d.field,
                        compact(&d.before),
                        compact(&d.after)
                    ));
                }
            }
        }
        for w in &self.warnings {
            lines.push(format!("warning: {}", w));
        }
        lines.join("\n")
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

// ──────────────────────────────────────────────
// Classification
// ──────────────────────────────────────────────

/// Input fields that are bookkeeping rather than part of a future's meaning.
const IGNORED_FIELDS: &[&str] = &["artifactId"];

pub fn reconcile(graph: &Graph, ctx: &ResolveContext<'_>) -> ReconciliationReport {
    let state = ctx.state;
    let mut report = ReconciliationReport::default();

    for future in graph.futures() {
        report.futures.push(FutureReconciliation {
            id: future.id().clone(),
            kind: future.kind(),
            result: classify(future, ctx),
        });
    }

    for id in state.execution_states.keys() {
        if !graph.contains(id) {
            report
                .warnings
                .push(format!("{} is recorded but no longer part of the module", id));
        }
    }
    report
}

fn classify(future: &Future, ctx: &ResolveContext<'_>) -> Reconciliation {
    let Some(recorded) = ctx.state.get(future.id()) else {
        return Reconciliation::New;
    };

    if recorded.kind != future.kind() {
        return Reconciliation::Conflicting {
            fields: vec![FieldDiff {
                field: "kind".to_string(),
                before: json!(recorded.kind.as_str()),
                after: json!(future.kind().as_str()),
            }],
        };
    }

    match recorded.status {
        ExecutionStatus::Failed | ExecutionStatus::Timeout => {
            return Reconciliation::PreviouslyFailed {
                status: recorded.status,
            }
        }
        _ => {}
    }

    let Some(before) = &recorded.inputs else {
        return Reconciliation::Unresolvable {
            message: "recorded without inputs".to_string(),
        };
    };
    let after = match resolve_inputs(future, ctx) {
        Ok(inputs) => inputs,
        Err(ResolveError::NotReady(dependency)) => {
            return Reconciliation::Unresolvable {
                message: format!("dependency {} no longer has a result", dependency),
            }
        }
        Err(e) => {
            return Reconciliation::Unresolvable {
                message: e.to_string(),
            }
        }
    };

    let before = serde_json::to_value(before).unwrap_or(Value::Null);
    let after = serde_json::to_value(&after).unwrap_or(Value::Null);
    let mut fields = diff_fields(&before, &after);
    if !declares_sender(future) {
        // An implicit sender follows the default account, which may
        // legitimately differ between runs.
        fields.retain(|d| d.field != "from");
    }

    if !fields.is_empty() {
        Reconciliation::Conflicting { fields }
    } else if recorded.status == ExecutionStatus::Success {
        Reconciliation::ResumableUnchanged
    } else {
        Reconciliation::ResumableInProgress
    }
}

fn declares_sender(future: &Future) -> bool {
    match future {
        Future::ContractDeployment(f) => f.from.is_some(),
        Future::LibraryDeployment(f) => f.from.is_some(),
        Future::Call(f) => f.from.is_some(),
        Future::StaticCall(f) => f.from.is_some(),
        Future::SendData(f) => f.from.is_some(),
        _ => true,
    }
}

/// Canonical form for comparison: integers as decimal strings and hex
/// strings lowercased, so `1` and `"1"` compare equal and checksummed
/// addresses match their lowercase form.
fn normalize_for_comparison(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::String(s) if s.starts_with("0x") || s.starts_with("0X") => {
            Value::String(s.to_ascii_lowercase())
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_for_comparison).collect()),
        Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (k, v) in map {
                normalized.insert(k.clone(), normalize_for_comparison(v));
            }
            Value::Object(normalized)
        }
        other => other.clone(),
    }
}

/// Field-level differences between two serialized inputs.
fn diff_fields(before: &Value, after: &Value) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    let (Some(before_obj), Some(after_obj)) = (before.as_object(), after.as_object()) else {
        if normalize_for_comparison(before) != normalize_for_comparison(after) {
            diffs.push(FieldDiff {
                field: "inputs".to_string(),
                before: before.clone(),
                after: after.clone(),
            });
        }
        return diffs;
    };

    let mut all_keys: Vec<&String> = before_obj.keys().chain(after_obj.keys()).collect();
    all_keys.sort();
    all_keys.dedup();

    for key in all_keys {
        if IGNORED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let b = before_obj.get(key).cloned().unwrap_or(Value::Null);
        let a = after_obj.get(key).cloned().unwrap_or(Value::Null);
        if normalize_for_comparison(&b) != normalize_for_comparison(&a) {
            diffs.push(FieldDiff {
                field: key.clone(),
                before: b,
                after: a,
            });
        }
    }
    diffs
}
