mod error;
mod file;
mod memory;
mod message;
mod record;
mod traits;

pub mod conformance;

pub use error::JournalError;
pub use file::{parse_journal, FileJournal};
pub use memory::MemoryJournal;
pub use message::JournalMessage;
pub use record::{
    ExecutionInputs, ExecutionResult, FailureReason, Log, NetworkFees, NetworkInteraction,
    NetworkInteractionRequest, OnchainInteraction, RawStaticCallResult, ResultValue,
    StaticCallInteraction, Transaction, TransactionReceipt,
};
pub use traits::Journal;
