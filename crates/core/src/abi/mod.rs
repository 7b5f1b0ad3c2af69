//! Solidity ABI handling for the values the engine sends and reads.
//!
//! Parsing and encoding are done by `alloy-json-abi` and `alloy-dyn-abi`;
//! this module adapts them to resolved JSON arguments and to the
//! name-or-signature lookups futures use.

pub mod contract;
pub mod value;

pub use contract::{describe_unknown_revert, AbiEvent, AbiFunction, ContractAbi};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("invalid ABI type '{0}'")]
    InvalidType(String),
    #[error("invalid ABI value: {0}")]
    InvalidValue(String),
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("cannot decode ABI data: {0}")]
    Decode(String),
    #[error("function '{0}' not found in ABI")]
    UnknownFunction(String),
    #[error("'{name}' is overloaded; use one of: {}", candidates.join(", "))]
    AmbiguousFunction {
        name: String,
        candidates: Vec<String>,
    },
    #[error("event '{0}' not found in ABI")]
    UnknownEvent(String),
    #[error("no output or argument named '{0}'")]
    UnknownOutput(String),
    #[error("malformed ABI: {0}")]
    InvalidAbi(String),
}
