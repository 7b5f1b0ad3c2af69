//! hoist-core: the declarative side of a deployment.
//!
//! Everything here is pure and synchronous: chain primitives, the future
//! sum type and its arguments, module intake, the validated [`Graph`], the
//! batcher, the ABI codec and artifact linking. The execution engine lives
//! in `hoist-engine`.

pub mod abi;
pub mod argument;
pub mod artifact;
pub mod batcher;
pub mod error;
pub mod future;
pub mod graph;
pub mod module;
pub mod primitives;

// ── Convenience re-exports ───────────────────────────────────────────

pub use abi::{AbiError, ContractAbi};
pub use argument::{Argument, ParameterRef};
pub use artifact::{
    Artifact, ArtifactError, ArtifactResolver, FsArtifactResolver, MemoryArtifactResolver,
};
pub use batcher::{batch, batch_pending, Batch};
pub use error::GraphError;
pub use future::{Future, FutureId, FutureKind, NameOrIndex};
pub use graph::Graph;
pub use module::{ModuleDescription, ModuleParameters};
pub use primitives::{Address, Bytes, TxHash, Wei, B256, U256};
