use async_trait::async_trait;

use crate::error::JournalError;
use crate::message::JournalMessage;

/// The durable, append-only log of a deployment.
///
/// ## Durability
///
/// `append` must not return `Ok` until the message is persisted: the engine
/// journals every transaction before awaiting it, and that is what makes a
/// process kill at any point recoverable.
///
/// ## Ordering
///
/// There is a single append stream per deployment. `replay` returns messages
/// in exactly the order their `append` calls completed.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static`; futures of one batch
/// append concurrently from separate tasks.
#[async_trait]
pub trait Journal: Send + Sync + 'static {
    /// Persist one message at the end of the log.
    async fn append(&self, message: &JournalMessage) -> Result<(), JournalError>;

    /// Every persisted message, in append order.
    async fn replay(&self) -> Result<Vec<JournalMessage>, JournalError>;
}
