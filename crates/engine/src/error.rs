use hoist_core::{AbiError, Address, ArtifactError, FutureId, GraphError};
use hoist_journal::JournalError;

use crate::network::RpcError;

/// Problems with the module, its parameters or the existing deployment that
/// are reported before anything is written to the journal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A `$param` without a default and without a supplied value.
    #[error("parameter '{name}' of module '{module}' has no value (used by {future})")]
    MissingParameter {
        module: String,
        name: String,
        future: FutureId,
    },

    /// The node reports a different chain than the one this deployment
    /// started on.
    #[error("deployment belongs to chain {journal} but the node reports chain {node}")]
    ChainIdMismatch { journal: u64, node: u64 },

    /// `$account` pointed past the accounts the node exposes.
    #[error("{future} uses account {index} but the node exposes {available} accounts")]
    AccountOutOfRange {
        future: FutureId,
        index: usize,
        available: usize,
    },

    #[error("the node exposes no accounts and no default sender was given")]
    NoAccounts,

    /// The journal and the module disagree in a way that cannot be resumed.
    #[error("reconciliation failed:\n{}", issues.join("\n"))]
    Reconciliation { issues: Vec<String> },

    /// `wipe` was asked for a future that was never started.
    #[error("future '{0}' has no execution state")]
    UnknownFuture(FutureId),
}

/// All errors the engine can return.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    /// A network failure that survived the retry policy. The affected
    /// future stays STARTED and resumes on the next run.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// An earlier nonce of this sender was recorded but rejected on its
    /// first send. New transactions of the sender wait for the next run.
    #[error("{sender} has unsent nonce {nonce}; its later transactions wait for the next run")]
    SenderHeld { sender: Address, nonce: u64 },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    /// An argument could not be turned into a concrete input value.
    #[error("cannot resolve inputs of {future}: {message}")]
    Resolution { future: FutureId, message: String },

    /// A journal message does not fit the state it is applied to. Always a
    /// bug or a hand-edited journal.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        EngineError::Invariant(message.into())
    }

    /// Whether the error ends the whole run. Everything else interrupts only
    /// the future it came from, which stays resumable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EngineError::Rpc(_)
                | EngineError::SenderHeld { .. }
                | EngineError::Artifact(_)
                | EngineError::Abi(_)
                | EngineError::Resolution { .. }
        )
    }
}
