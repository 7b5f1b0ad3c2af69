//! hoist-engine: executes a [`Graph`](hoist_core::Graph) against a chain.
//!
//! A run replays the deployment's journal into a [`DeploymentState`],
//! reconciles the graph against it, batches what is left and drives every
//! future through the [`FutureProcessor`]. Each transition is appended to
//! the journal before it becomes visible, so a run can be killed at any
//! point and resumed by running again.

pub mod config;
pub mod deployer;
pub mod error;
pub mod events;
pub mod loader;
pub mod network;
pub mod processor;
pub mod reconciler;
pub mod state;
pub mod status;
pub mod store;
pub mod wipe;

pub use config::{EngineConfig, RetryConfig};
pub use deployer::{Deployer, FutureOutcome, RunOptions, RunReport};
pub use error::{EngineError, ValidationError};
pub use events::{ChannelListener, ExecutionEvent, ExecutionEventListener, NoopListener};
pub use loader::{DeploymentLoader, FileDeploymentLoader, MemoryDeploymentLoader};
pub use network::{HttpJsonRpcClient, JsonRpcClient, RpcError};
pub use processor::{next_action, FutureProcessor, NextAction};
pub use reconciler::{reconcile, FieldDiff, Reconciliation, ReconciliationReport};
pub use state::{DeploymentState, ExecutionState, ExecutionStatus};
pub use status::{FutureStatus, StatusReport};
pub use store::ExecutionStore;
pub use wipe::wipe;
