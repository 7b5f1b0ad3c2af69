//! Conversion between resolved JSON arguments and `DynSolValue`s.
//!
//! Integers come back as decimal strings so values wider than 53 bits
//! survive a trip through JSON; byte strings and addresses come back as
//! `0x` hex.

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{EventParam, Param};
use serde_json::Value;

use super::AbiError;
use crate::primitives::{decode_hex, hex, Address, B256};

pub(crate) fn resolve_params(params: &[Param]) -> Result<Vec<DynSolType>, AbiError> {
    params
        .iter()
        .map(|p| {
            p.resolve()
                .map_err(|e| AbiError::InvalidType(format!("{}: {}", p.ty, e)))
        })
        .collect()
}

pub(crate) fn resolve_event_param(param: &EventParam) -> Result<DynSolType, AbiError> {
    param
        .resolve()
        .map_err(|e| AbiError::InvalidType(format!("{}: {}", param.ty, e)))
}

fn invalid(ty: &DynSolType, value: &Value, why: impl std::fmt::Display) -> AbiError {
    AbiError::InvalidValue(format!("{} for {}: {}", value, ty, why))
}

fn scalar_text(ty: &DynSolType, value: &Value) -> Result<String, AbiError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(invalid(ty, value, "expected a scalar")),
    }
}

/// Coerce one JSON value to the given Solidity type.
pub fn from_json(ty: &DynSolType, value: &Value) -> Result<DynSolValue, AbiError> {
    match ty {
        DynSolType::Array(inner) => {
            let items = value
                .as_array()
                .ok_or_else(|| invalid(ty, value, "expected an array"))?;
            items
                .iter()
                .map(|item| from_json(inner, item))
                .collect::<Result<_, _>>()
                .map(DynSolValue::Array)
        }
        DynSolType::FixedArray(inner, n) => {
            let items = value
                .as_array()
                .ok_or_else(|| invalid(ty, value, "expected an array"))?;
            if items.len() != *n {
                return Err(invalid(ty, value, format!("expected {} items", n)));
            }
            items
                .iter()
                .map(|item| from_json(inner, item))
                .collect::<Result<_, _>>()
                .map(DynSolValue::FixedArray)
        }
        DynSolType::Tuple(types) => {
            let items = value
                .as_array()
                .ok_or_else(|| invalid(ty, value, "expected an array"))?;
            if items.len() != types.len() {
                return Err(invalid(ty, value, format!("expected {} fields", types.len())));
            }
            types
                .iter()
                .zip(items)
                .map(|(t, item)| from_json(t, item))
                .collect::<Result<_, _>>()
                .map(DynSolValue::Tuple)
        }
        DynSolType::Bool => match value {
            Value::Bool(b) => Ok(DynSolValue::Bool(*b)),
            _ => Err(invalid(ty, value, "expected a boolean")),
        },
        DynSolType::String => match value {
            Value::String(s) => Ok(DynSolValue::String(s.clone())),
            _ => Err(invalid(ty, value, "expected a string")),
        },
        DynSolType::Address => {
            let text = scalar_text(ty, value)?;
            text.parse::<Address>()
                .map(DynSolValue::Address)
                .map_err(|e| invalid(ty, value, e))
        }
        DynSolType::Bytes => {
            let text = scalar_text(ty, value)?;
            decode_hex(&text)
                .map(DynSolValue::Bytes)
                .map_err(|e| invalid(ty, value, e))
        }
        DynSolType::FixedBytes(n) => {
            let bytes = decode_hex(&scalar_text(ty, value)?).map_err(|e| invalid(ty, value, e))?;
            if bytes.len() != *n {
                return Err(invalid(ty, value, format!("expected {} bytes", n)));
            }
            let mut word = B256::ZERO;
            word[..*n].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(word, *n))
        }
        _ => {
            let text = scalar_text(ty, value)?;
            ty.coerce_str(&text).map_err(|e| invalid(ty, value, e))
        }
    }
}

/// Coerce a full argument list against parameter types.
pub fn from_json_list(types: &[DynSolType], values: &[Value]) -> Result<DynSolValue, AbiError> {
    if types.len() != values.len() {
        return Err(AbiError::ArgumentCount {
            expected: types.len(),
            actual: values.len(),
        });
    }
    types
        .iter()
        .zip(values)
        .map(|(ty, v)| from_json(ty, v))
        .collect::<Result<_, _>>()
        .map(DynSolValue::Tuple)
}

/// Render a decoded value as JSON.
pub fn to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Address(a) => Value::String(a.to_string()),
        DynSolValue::FixedBytes(word, n) => Value::String(hex::encode_prefixed(&word[..*n])),
        DynSolValue::Bytes(b) => Value::String(hex::encode_prefixed(b)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Function(f) => Value::String(hex::encode_prefixed(f)),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(to_json).collect())
        }
        #[allow(unreachable_patterns)]
        other => Value::String(format!("{:?}", other)),
    }
}

/// Decode the parameter list `types` from `data`.
pub fn decode_params(types: &[DynSolType], data: &[u8]) -> Result<Vec<DynSolValue>, AbiError> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    match DynSolType::Tuple(types.to_vec()).abi_decode_params(data) {
        Ok(DynSolValue::Tuple(values)) => Ok(values),
        Ok(other) => Ok(vec![other]),
        Err(e) => Err(AbiError::Decode(e.to_string())),
    }
}
