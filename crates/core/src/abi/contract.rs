//! Contract ABI documents: function and event lookup, call encoding,
//! output and log decoding, revert reasons.

use std::ops::Deref;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::{Event, Function, JsonAbi};
use alloy_sol_types::{Panic, Revert, SolError};
use serde_json::Value;

use super::value::{decode_params, from_json_list, resolve_event_param, resolve_params, to_json};
use super::AbiError;
use crate::future::NameOrIndex;
use crate::primitives::{hex, B256};

fn pick<'a>(
    names: impl Iterator<Item = &'a str>,
    values: Vec<Value>,
    which: &NameOrIndex,
) -> Result<Value, AbiError> {
    let index = match which {
        NameOrIndex::Index(i) => Some(*i),
        NameOrIndex::Name(name) => names.into_iter().position(|n| n == name),
    };
    index
        .and_then(|i| values.into_iter().nth(i))
        .ok_or_else(|| AbiError::UnknownOutput(which.to_string()))
}

/// A function of a [`ContractAbi`].
#[derive(Debug, Clone, Copy)]
pub struct AbiFunction<'a>(&'a Function);

impl Deref for AbiFunction<'_> {
    type Target = Function;

    fn deref(&self) -> &Function {
        self.0
    }
}

impl AbiFunction<'_> {
    /// Selector followed by the encoded arguments.
    pub fn encode_input(&self, args: &[Value]) -> Result<Vec<u8>, AbiError> {
        let types = resolve_params(&self.inputs)?;
        let encoded = from_json_list(&types, args)?.abi_encode_params();
        let mut out = self.selector().to_vec();
        out.extend(encoded);
        Ok(out)
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Value>, AbiError> {
        let types = resolve_params(&self.outputs)?;
        Ok(decode_params(&types, data)?.iter().map(to_json).collect())
    }

    /// Decode return data and select one output by name or position.
    pub fn output_value(&self, data: &[u8], which: &NameOrIndex) -> Result<Value, AbiError> {
        let values = self.decode_output(data)?;
        pick(self.outputs.iter().map(|p| p.name.as_str()), values, which)
    }
}

/// An event of a [`ContractAbi`].
#[derive(Debug, Clone, Copy)]
pub struct AbiEvent<'a>(&'a Event);

impl Deref for AbiEvent<'_> {
    type Target = Event;

    fn deref(&self) -> &Event {
        self.0
    }
}

impl AbiEvent<'_> {
    pub fn topic(&self) -> Result<B256, AbiError> {
        Ok(self.selector())
    }

    /// Decode every argument of one log, in declaration order. Indexed
    /// arguments of reference types are only available as their topic hash.
    pub fn decode_log(&self, topics: &[B256], data: &[u8]) -> Result<Vec<Value>, AbiError> {
        let mut indexed_topics = topics.iter().skip(if self.anonymous { 0 } else { 1 });
        let plain: Vec<DynSolType> = self
            .inputs
            .iter()
            .filter(|p| !p.indexed)
            .map(resolve_event_param)
            .collect::<Result<_, _>>()?;
        let mut plain_values = decode_params(&plain, data)?.into_iter();

        let mut out = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if input.indexed {
                let topic = indexed_topics
                    .next()
                    .ok_or_else(|| AbiError::Decode(format!("missing topic for '{}'", input.name)))?;
                let ty = resolve_event_param(input)?;
                let hashed = ty.is_dynamic()
                    || matches!(ty, DynSolType::Tuple(_) | DynSolType::FixedArray(..));
                if hashed {
                    out.push(Value::String(topic.to_string()));
                } else {
                    let value = ty
                        .abi_decode(topic.as_slice())
                        .map_err(|e| AbiError::Decode(e.to_string()))?;
                    out.push(to_json(&value));
                }
            } else {
                let value = plain_values.next().ok_or_else(|| {
                    AbiError::Decode(format!("missing data for '{}'", input.name))
                })?;
                out.push(to_json(&value));
            }
        }
        Ok(out)
    }

    pub fn argument(
        &self,
        topics: &[B256],
        data: &[u8],
        which: &NameOrIndex,
    ) -> Result<Value, AbiError> {
        let values = self.decode_log(topics, data)?;
        pick(self.inputs.iter().map(|p| p.name.as_str()), values, which)
    }
}

/// A parsed contract ABI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractAbi {
    inner: JsonAbi,
}

impl ContractAbi {
    pub fn from_json(abi: &Value) -> Result<ContractAbi, AbiError> {
        let inner: JsonAbi =
            serde_json::from_value(abi.clone()).map_err(|e| AbiError::InvalidAbi(e.to_string()))?;
        Ok(ContractAbi { inner })
    }

    pub fn json_abi(&self) -> &JsonAbi {
        &self.inner
    }

    /// Find a function by bare name or by full signature `name(type,...)`.
    /// A bare name that is overloaded is ambiguous.
    pub fn function(&self, name_or_signature: &str) -> Result<AbiFunction<'_>, AbiError> {
        if name_or_signature.contains('(') {
            return self
                .inner
                .functions()
                .find(|f| f.signature() == name_or_signature)
                .map(AbiFunction)
                .ok_or_else(|| AbiError::UnknownFunction(name_or_signature.to_string()));
        }
        match self.inner.function(name_or_signature).map(Vec::as_slice) {
            None | Some([]) => Err(AbiError::UnknownFunction(name_or_signature.to_string())),
            Some([one]) => Ok(AbiFunction(one)),
            Some(many) => Err(AbiError::AmbiguousFunction {
                name: name_or_signature.to_string(),
                candidates: many.iter().map(Function::signature).collect(),
            }),
        }
    }

    /// Find an event by bare name or by full signature.
    pub fn event(&self, name_or_signature: &str) -> Result<AbiEvent<'_>, AbiError> {
        if name_or_signature.contains('(') {
            return self
                .inner
                .events()
                .find(|e| e.signature() == name_or_signature)
                .map(AbiEvent)
                .ok_or_else(|| AbiError::UnknownEvent(name_or_signature.to_string()));
        }
        match self.inner.event(name_or_signature).map(Vec::as_slice) {
            None | Some([]) => Err(AbiError::UnknownEvent(name_or_signature.to_string())),
            Some([one]) => Ok(AbiEvent(one)),
            Some(many) => Err(AbiError::AmbiguousFunction {
                name: name_or_signature.to_string(),
                candidates: many.iter().map(Event::signature).collect(),
            }),
        }
    }

    /// Encode constructor arguments (no selector).
    pub fn encode_constructor(&self, args: &[Value]) -> Result<Vec<u8>, AbiError> {
        let inputs = self
            .inner
            .constructor
            .as_ref()
            .map(|c| c.inputs.as_slice())
            .unwrap_or_default();
        let types = resolve_params(inputs)?;
        Ok(from_json_list(&types, args)?.abi_encode_params())
    }

    /// Human-readable reason for revert data, decoding custom errors
    /// declared in this ABI.
    pub fn decode_revert(&self, data: &[u8]) -> String {
        if let Some(reason) = decode_builtin_revert(data) {
            return reason;
        }
        if data.len() >= 4 {
            for err in self.inner.errors() {
                if err.selector().as_slice() != &data[..4] {
                    continue;
                }
                let decoded =
                    resolve_params(&err.inputs).and_then(|types| decode_params(&types, &data[4..]));
                if let Ok(values) = decoded {
                    let args: Vec<String> = values.iter().map(render_value).collect();
                    return format!("reverted with custom error {}({})", err.name, args.join(", "));
                }
            }
        }
        describe_unknown_revert(data)
    }
}

fn render_value(v: &DynSolValue) -> String {
    match to_json(v) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn panic_reason(code: &str) -> &'static str {
    match code {
        "1" => "assertion failed",
        "17" => "arithmetic overflow or underflow",
        "18" => "division or modulo by zero",
        "33" => "invalid enum conversion",
        "34" => "corrupt storage byte array",
        "49" => "pop on an empty array",
        "50" => "array index out of bounds",
        "65" => "out of memory",
        "81" => "call to a zero-initialized function",
        _ => "unknown panic code",
    }
}

/// Decode `Error(string)` and `Panic(uint256)` revert payloads.
pub fn decode_builtin_revert(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    if data[..4] == Revert::SELECTOR {
        let revert = Revert::abi_decode(data).ok()?;
        return Some(format!("reverted with reason '{}'", revert.reason));
    }
    if data[..4] == Panic::SELECTOR {
        let panic = Panic::abi_decode(data).ok()?;
        let code = panic.code.to_string();
        return Some(format!(
            "reverted with panic code {} ({})",
            code,
            panic_reason(&code)
        ));
    }
    None
}

/// Revert reason without any ABI to consult.
pub fn describe_unknown_revert(data: &[u8]) -> String {
    if let Some(reason) = decode_builtin_revert(data) {
        return reason;
    }
    if data.is_empty() {
        "reverted without a reason".to_string()
    } else {
        format!("reverted with unrecognized data {}", hex::encode_prefixed(data))
    }
}
