use std::fmt;

use serde_json::Value;

use crate::future::{FutureId, FutureKind};

/// A graph construction error: malformed module input, a dangling or
/// ill-typed reference, or a dependency cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The module description could not be read or parsed.
    InvalidModule(String),
    /// Two futures share the same fully-qualified id.
    DuplicateId(FutureId),
    /// A future refers to an id that is not part of the graph.
    UnknownReference {
        future: FutureId,
        field: String,
        target: FutureId,
    },
    /// A future refers to a future of a kind that cannot satisfy the field.
    IncompatibleReference {
        future: FutureId,
        field: String,
        target: FutureId,
        target_kind: FutureKind,
        expected: &'static str,
    },
    /// Every strongly connected component with more than one member (or a
    /// self-edge), each listed in id order.
    Cycle { participants: Vec<Vec<FutureId>> },
}

impl GraphError {
    /// The future the error is attached to, when there is a single one.
    pub fn future_id(&self) -> Option<&FutureId> {
        match self {
            GraphError::DuplicateId(id) => Some(id),
            GraphError::UnknownReference { future, .. } => Some(future),
            GraphError::IncompatibleReference { future, .. } => Some(future),
            GraphError::InvalidModule(_) | GraphError::Cycle { .. } => None,
        }
    }

    pub fn to_json_value(&self) -> Value {
        let field = match self {
            GraphError::UnknownReference { field, .. }
            | GraphError::IncompatibleReference { field, .. } => Some(field.clone()),
            _ => None,
        };
        let cycles = match self {
            GraphError::Cycle { participants } => participants
                .iter()
                .map(|c| c.iter().map(|id| id.to_string()).collect::<Vec<_>>())
                .collect(),
            _ => Vec::new(),
        };
        serde_json::json!({
            "futureId": self.future_id().map(|id| id.to_string()),
            "field": field,
            "cycles": cycles,
            "message": self.to_string(),
        })
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::InvalidModule(msg) => write!(f, "invalid module: {}", msg),
            GraphError::DuplicateId(id) => write!(f, "duplicate future id '{}'", id),
            GraphError::UnknownReference {
                future,
                field,
                target,
            } => write!(
                f,
                "future '{}' field '{}' references unknown future '{}'",
                future, field, target
            ),
            GraphError::IncompatibleReference {
                future,
                field,
                target,
                target_kind,
                expected,
            } => write!(
                f,
                "future '{}' field '{}' references '{}' ({}), expected {}",
                future, field, target, target_kind, expected
            ),
            GraphError::Cycle { participants } => {
                write!(f, "dependency cycle detected:")?;
                for (i, cycle) in participants.iter().enumerate() {
                    let ids: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    write!(f, " [{}]", ids.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GraphError {}
