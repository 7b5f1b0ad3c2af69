//! Chain primitives shared by every hoist crate.
//!
//! Addresses, words and byte strings are the `alloy-primitives` types.
//! Amounts of wei get their own newtype over [`U256`] that serializes as a
//! decimal string, so journal lines stay readable and never lose precision
//! in JSON.

use std::fmt;
use std::str::FromStr;

pub use alloy_primitives::{hex, keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Transaction hashes are plain 32-byte words.
pub type TxHash = B256;

/// Error produced when a primitive cannot be parsed from its text form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrimitiveError {
    #[error("invalid hex '{input}': {message}")]
    InvalidHex { input: String, message: String },
    #[error("invalid wei amount '{0}'")]
    InvalidAmount(String),
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode a `0x`-prefixed (or bare) hex string. Odd lengths are left-padded,
/// as compilers emit them for some bytecode fragments.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, PrimitiveError> {
    let body = strip_0x(s);
    let padded;
    let body = if body.len() % 2 == 1 {
        padded = format!("0{}", body);
        padded.as_str()
    } else {
        body
    };
    hex::decode(body).map_err(|e| PrimitiveError::InvalidHex {
        input: s.to_string(),
        message: e.to_string(),
    })
}

// ──────────────────────────────────────────────
// Wei
// ──────────────────────────────────────────────

/// An amount of wei. Serialized as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Wei(pub U256);

impl Wei {
    pub const ZERO: Wei = Wei(U256::ZERO);

    pub const fn new(value: u128) -> Wei {
        Wei(U256::from_limbs([value as u64, (value >> 64) as u64, 0, 0]))
    }

    /// Scale by `percent` / 100, saturating.
    pub fn scale_percent(self, percent: u32) -> Wei {
        Wei(self.0.saturating_mul(U256::from(percent)) / U256::from(100u8))
    }

    pub fn saturating_add(self, other: Wei) -> Wei {
        Wei(self.0.saturating_add(other.0))
    }

    pub fn saturating_mul(self, factor: u64) -> Wei {
        Wei(self.0.saturating_mul(U256::from(factor)))
    }

    /// Parse a JSON amount: a non-negative integer number, a decimal string,
    /// or a `0x` quantity.
    pub fn from_json(value: &serde_json::Value) -> Result<Wei, PrimitiveError> {
        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(Wei::from)
                .ok_or_else(|| PrimitiveError::InvalidAmount(n.to_string())),
            serde_json::Value::String(s) => s.parse(),
            other => Err(PrimitiveError::InvalidAmount(other.to_string())),
        }
    }
}

impl From<u64> for Wei {
    fn from(v: u64) -> Self {
        Wei(U256::from(v))
    }
}

impl From<u128> for Wei {
    fn from(v: u128) -> Self {
        Wei(U256::from(v))
    }
}

impl From<U256> for Wei {
    fn from(v: U256) -> Self {
        Wei(v)
    }
}

impl FromStr for Wei {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some("") => Ok(U256::ZERO),
            Some(hex_body) => U256::from_str_radix(hex_body, 16),
            None => U256::from_str_radix(trimmed, 10),
        };
        parsed
            .map(Wei)
            .map_err(|_| PrimitiveError::InvalidAmount(s.to_string()))
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Wei {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ──────────────────────────────────────────────
// JSON-RPC quantities
// ──────────────────────────────────────────────

/// Parse a `0x` JSON-RPC quantity into a u64.
pub fn parse_quantity(s: &str) -> Result<u64, PrimitiveError> {
    let body = strip_0x(s);
    if body.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(body, 16).map_err(|_| PrimitiveError::InvalidAmount(s.to_string()))
}

/// Format a u64 as a `0x` JSON-RPC quantity.
pub fn format_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}
