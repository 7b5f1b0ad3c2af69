/// All errors that can be returned by a [`Journal`](crate::Journal) implementation.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// The journal file could not be opened, written or synced.
    #[error("journal io error on {path}: {message}")]
    Io { path: String, message: String },

    /// A message could not be serialized.
    #[error("cannot serialize journal message: {0}")]
    Serialize(String),

    /// A complete line in the middle of the journal is not a valid message.
    /// Only a trailing partial line (an interrupted append) is tolerated.
    #[error("journal line {line} is corrupt: {message}")]
    Corrupt { line: usize, message: String },

    /// A backend-specific failure (task join, poisoned state, etc.).
    #[error("journal backend error: {0}")]
    Backend(String),
}
