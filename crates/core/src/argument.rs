//! Future arguments: JSON literals with embedded references.
//!
//! Three single-key object shapes are references rather than literals:
//!
//! - `{"$future": "Module#Id"}`: the result of another future
//! - `{"$param": {"name": "...", "default": ...}}`: a module parameter
//! - `{"$account": 0}`: one of the node's accounts
//!
//! Everything else is carried through untouched. Arguments are resolved to
//! plain JSON by the engine right before a future is initialized.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::future::FutureId;

const FUTURE_KEY: &str = "$future";
const PARAM_KEY: &str = "$param";
const ACCOUNT_KEY: &str = "$account";

/// Reference to a module parameter, scoped to the module that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRef {
    pub module: String,
    pub name: String,
    pub default: Option<Value>,
}

/// A possibly-nested argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Argument {
    /// A scalar JSON value (string, number, bool, null).
    Literal(Value),
    Array(Vec<Argument>),
    Object(BTreeMap<String, Argument>),
    Future(FutureId),
    Parameter(ParameterRef),
    Account(usize),
}

impl Argument {
    /// Parse a JSON value. Parameter references are left unscoped (empty
    /// module) until [`Argument::qualify`] runs.
    pub fn from_json(value: &Value) -> Result<Argument, String> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(Argument::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Argument::Array),
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(target) = map.get(FUTURE_KEY) {
                        let id = target
                            .as_str()
                            .ok_or_else(|| "'$future' must be a string".to_string())?;
                        return Ok(Argument::Future(FutureId::from_raw(id)));
                    }
                    if let Some(param) = map.get(PARAM_KEY) {
                        return parse_param(param);
                    }
                    if let Some(index) = map.get(ACCOUNT_KEY) {
                        let index = index
                            .as_u64()
                            .ok_or_else(|| "'$account' must be a non-negative integer".to_string())?;
                        return Ok(Argument::Account(index as usize));
                    }
                }
                map.iter()
                    .map(|(k, v)| Argument::from_json(v).map(|a| (k.clone(), a)))
                    .collect::<Result<BTreeMap<_, _>, _>>()
                    .map(Argument::Object)
            }
            other => Ok(Argument::Literal(other.clone())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Argument::Literal(v) => v.clone(),
            Argument::Array(items) => Value::Array(items.iter().map(Argument::to_json).collect()),
            Argument::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Argument::Future(id) => single_key(FUTURE_KEY, Value::String(id.as_str().to_string())),
            Argument::Parameter(p) => {
                let mut inner = serde_json::Map::new();
                inner.insert("name".to_string(), Value::String(p.name.clone()));
                if !p.module.is_empty() {
                    inner.insert("module".to_string(), Value::String(p.module.clone()));
                }
                if let Some(d) = &p.default {
                    inner.insert("default".to_string(), d.clone());
                }
                single_key(PARAM_KEY, Value::Object(inner))
            }
            Argument::Account(i) => single_key(ACCOUNT_KEY, Value::from(*i as u64)),
        }
    }

    /// Collect every future referenced anywhere inside this argument.
    pub fn future_refs(&self, out: &mut BTreeSet<FutureId>) {
        match self {
            Argument::Future(id) => {
                out.insert(id.clone());
            }
            Argument::Array(items) => items.iter().for_each(|a| a.future_refs(out)),
            Argument::Object(map) => map.values().for_each(|a| a.future_refs(out)),
            Argument::Literal(_) | Argument::Parameter(_) | Argument::Account(_) => {}
        }
    }

    /// Collect every parameter referenced anywhere inside this argument.
    pub fn parameter_refs<'a>(&'a self, out: &mut Vec<&'a ParameterRef>) {
        match self {
            Argument::Parameter(p) => out.push(p),
            Argument::Array(items) => items.iter().for_each(|a| a.parameter_refs(out)),
            Argument::Object(map) => map.values().for_each(|a| a.parameter_refs(out)),
            Argument::Literal(_) | Argument::Future(_) | Argument::Account(_) => {}
        }
    }

    /// Qualify future references and scope parameters to `module`.
    pub fn qualify(&mut self, module: &str) {
        match self {
            Argument::Future(id) => *id = id.qualify(module),
            Argument::Parameter(p) => {
                if p.module.is_empty() {
                    p.module = module.to_string();
                }
            }
            Argument::Array(items) => items.iter_mut().for_each(|a| a.qualify(module)),
            Argument::Object(map) => map.values_mut().for_each(|a| a.qualify(module)),
            Argument::Literal(_) | Argument::Account(_) => {}
        }
    }
}

fn single_key(key: &str, value: Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn parse_param(param: &Value) -> Result<Argument, String> {
    let obj = param
        .as_object()
        .ok_or_else(|| "'$param' must be an object".to_string())?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| "'$param' requires a string 'name'".to_string())?;
    let module = obj
        .get("module")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(Argument::Parameter(ParameterRef {
        module: module.to_string(),
        name: name.to_string(),
        default: obj.get("default").cloned(),
    }))
}

impl TryFrom<Value> for Argument {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Argument::from_json(&value)
    }
}

impl From<Argument> for Value {
    fn from(arg: Argument) -> Self {
        arg.to_json()
    }
}

impl Default for Argument {
    fn default() -> Self {
        Argument::Literal(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_references_are_found() {
        let arg = Argument::from_json(&json!([
            1,
            { "$future": "Token" },
            { "owner": { "$account": 1 }, "cap": { "$param": { "name": "cap", "default": 10 } } }
        ]))
        .unwrap();

        let mut futures = BTreeSet::new();
        arg.future_refs(&mut futures);
        assert_eq!(futures.len(), 1);

        let mut params = Vec::new();
        arg.parameter_refs(&mut params);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "cap");
        assert_eq!(params[0].default, Some(json!(10)));
    }

    #[test]
    fn qualify_scopes_futures_and_params() {
        let mut arg = Argument::from_json(&json!([
            { "$future": "Token" },
            { "$future": "Other#Vault" },
            { "$param": { "name": "cap" } }
        ]))
        .unwrap();
        arg.qualify("Main");

        let mut futures = BTreeSet::new();
        arg.future_refs(&mut futures);
        let ids: Vec<&str> = futures.iter().map(|f| f.as_str()).collect();
        assert_eq!(ids, vec!["Main#Token", "Other#Vault"]);

        let mut params = Vec::new();
        arg.parameter_refs(&mut params);
        assert_eq!(params[0].module, "Main");
    }

    #[test]
    fn objects_with_extra_keys_stay_literal_objects() {
        let arg = Argument::from_json(&json!({ "$future": "A", "extra": 1 })).unwrap();
        assert!(matches!(arg, Argument::Object(_)));
    }

    #[test]
    fn malformed_account_is_rejected() {
        assert!(Argument::from_json(&json!({ "$account": "zero" })).is_err());
    }
}
