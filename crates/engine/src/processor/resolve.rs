//! Turning a future's declared arguments into concrete inputs.
//!
//! Resolution reads only the deployment state, the module parameters and
//! the node's accounts. It never touches artifacts, so the reconciler can
//! run it for every future without loading a single file.

use std::collections::BTreeMap;
use std::fmt;

use hoist_core::module::resolve_parameter;
use hoist_core::{
    Address, Argument, Bytes, Future, FutureId, Graph, ModuleParameters, TxHash, Wei,
};
use hoist_journal::{ExecutionInputs, ResultValue};
use serde_json::Value;

use crate::error::{EngineError, ValidationError};
use crate::state::DeploymentState;

/// What argument resolution can see.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub state: &'a DeploymentState,
    pub parameters: &'a ModuleParameters,
    pub accounts: &'a [Address],
    /// Sender for futures without an explicit `from`.
    pub default_sender: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    MissingParameter { module: String, name: String },
    AccountOutOfRange { index: usize, available: usize },
    /// The referenced future has not produced a result yet.
    NotReady(FutureId),
    Invalid(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::MissingParameter { module, name } => {
                write!(f, "parameter '{}' of module '{}' has no value", name, module)
            }
            ResolveError::AccountOutOfRange { index, available } => write!(
                f,
                "account {} requested but only {} available",
                index, available
            ),
            ResolveError::NotReady(id) => write!(f, "result of '{}' is not available", id),
            ResolveError::Invalid(message) => f.write_str(message),
        }
    }
}

impl ResolveError {
    pub fn into_engine_error(self, future: &FutureId) -> EngineError {
        match self {
            ResolveError::MissingParameter { module, name } => {
                ValidationError::MissingParameter {
                    module,
                    name,
                    future: future.clone(),
                }
                .into()
            }
            ResolveError::AccountOutOfRange { index, available } => {
                ValidationError::AccountOutOfRange {
                    future: future.clone(),
                    index,
                    available,
                }
                .into()
            }
            other => EngineError::Resolution {
                future: future.clone(),
                message: other.to_string(),
            },
        }
    }
}

/// Every `$param` in the graph must have a value before anything runs.
pub fn check_parameters(graph: &Graph, parameters: &ModuleParameters) -> Result<(), ValidationError> {
    for (future, param) in graph.parameter_refs() {
        if resolve_parameter(parameters, &param).is_none() {
            return Err(ValidationError::MissingParameter {
                module: param.module.clone(),
                name: param.name.clone(),
                future,
            });
        }
    }
    Ok(())
}

pub fn resolve_argument(arg: &Argument, ctx: &ResolveContext<'_>) -> Result<Value, ResolveError> {
    match arg {
        Argument::Literal(v) => Ok(v.clone()),
        Argument::Array(items) => items
            .iter()
            .map(|a| resolve_argument(a, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Argument::Object(map) => map
            .iter()
            .map(|(k, v)| resolve_argument(v, ctx).map(|v| (k.clone(), v)))
            .collect::<Result<serde_json::Map<_, _>, _>>()
            .map(Value::Object),
        Argument::Future(id) => success(id, ctx)?
            .as_argument()
            .ok_or_else(|| ResolveError::Invalid(format!("'{}' produced no value", id))),
        Argument::Parameter(p) => {
            resolve_parameter(ctx.parameters, p).ok_or_else(|| ResolveError::MissingParameter {
                module: p.module.clone(),
                name: p.name.clone(),
            })
        }
        Argument::Account(index) => ctx
            .accounts
            .get(*index)
            .map(|a| Value::String(a.to_string()))
            .ok_or(ResolveError::AccountOutOfRange {
                index: *index,
                available: ctx.accounts.len(),
            }),
    }
}

fn success<'a>(id: &FutureId, ctx: &ResolveContext<'a>) -> Result<&'a ResultValue, ResolveError> {
    ctx.state
        .get(id)
        .and_then(|s| s.success_value())
        .ok_or_else(|| ResolveError::NotReady(id.clone()))
}

fn future_address(id: &FutureId, ctx: &ResolveContext<'_>) -> Result<Address, ResolveError> {
    success(id, ctx)?
        .address()
        .ok_or_else(|| ResolveError::Invalid(format!("'{}' did not produce an address", id)))
}

fn resolve_address(arg: &Argument, ctx: &ResolveContext<'_>) -> Result<Address, ResolveError> {
    let value = resolve_argument(arg, ctx)?;
    value
        .as_str()
        .and_then(|s| s.parse::<Address>().ok())
        .ok_or_else(|| ResolveError::Invalid(format!("{} is not an address", value)))
}

fn resolve_sender(from: Option<&Argument>, ctx: &ResolveContext<'_>) -> Result<Address, ResolveError> {
    match from {
        Some(arg) => resolve_address(arg, ctx),
        None => Ok(ctx.default_sender),
    }
}

fn resolve_value(arg: &Argument, ctx: &ResolveContext<'_>) -> Result<Wei, ResolveError> {
    let value = resolve_argument(arg, ctx)?;
    Wei::from_json(&value).map_err(|e| ResolveError::Invalid(e.to_string()))
}

fn resolve_args(args: &[Argument], ctx: &ResolveContext<'_>) -> Result<Vec<Value>, ResolveError> {
    args.iter().map(|a| resolve_argument(a, ctx)).collect()
}

fn resolve_libraries(
    libraries: &BTreeMap<String, FutureId>,
    ctx: &ResolveContext<'_>,
) -> Result<BTreeMap<String, Address>, ResolveError> {
    libraries
        .iter()
        .map(|(name, id)| future_address(id, ctx).map(|a| (name.clone(), a)))
        .collect()
}

/// Hash of the confirmed transaction of a transaction-sending future.
fn confirmed_hash(id: &FutureId, ctx: &ResolveContext<'_>) -> Result<TxHash, ResolveError> {
    ctx.state
        .get(id)
        .filter(|s| s.success_value().is_some())
        .and_then(|s| s.confirmed_receipt())
        .map(|r| r.transaction_hash)
        .ok_or_else(|| ResolveError::NotReady(id.clone()))
}

pub fn resolve_inputs(
    future: &Future,
    ctx: &ResolveContext<'_>,
) -> Result<ExecutionInputs, ResolveError> {
    Ok(match future {
        Future::ContractDeployment(f) => ExecutionInputs::ContractDeployment {
            artifact_id: f.id.clone(),
            contract_name: f.contract_name.clone(),
            constructor_args: resolve_args(&f.constructor_args, ctx)?,
            libraries: resolve_libraries(&f.libraries, ctx)?,
            value: resolve_value(&f.value, ctx)?,
            from: resolve_sender(f.from.as_ref(), ctx)?,
        },
        Future::LibraryDeployment(f) => ExecutionInputs::LibraryDeployment {
            artifact_id: f.id.clone(),
            contract_name: f.contract_name.clone(),
            libraries: resolve_libraries(&f.libraries, ctx)?,
            from: resolve_sender(f.from.as_ref(), ctx)?,
        },
        Future::ContractAt(f) => ExecutionInputs::ContractAt {
            artifact_id: f.id.clone(),
            contract_name: f.contract_name.clone(),
            address: resolve_address(&f.address, ctx)?,
        },
        Future::Call(f) => ExecutionInputs::Call {
            artifact_id: f.contract.clone(),
            contract_address: future_address(&f.contract, ctx)?,
            function_name: f.function_name.clone(),
            args: resolve_args(&f.args, ctx)?,
            value: resolve_value(&f.value, ctx)?,
            from: resolve_sender(f.from.as_ref(), ctx)?,
        },
        Future::StaticCall(f) => ExecutionInputs::StaticCall {
            artifact_id: f.contract.clone(),
            contract_address: future_address(&f.contract, ctx)?,
            function_name: f.function_name.clone(),
            args: resolve_args(&f.args, ctx)?,
            name_or_index: f.name_or_index.clone(),
            from: resolve_sender(f.from.as_ref(), ctx)?,
        },
        Future::SendData(f) => ExecutionInputs::SendData {
            to: resolve_address(&f.to, ctx)?,
            data: match &f.data {
                Some(hex) => hex
                    .parse::<Bytes>()
                    .map_err(|e| ResolveError::Invalid(format!("data: {}", e)))?,
                None => Bytes::default(),
            },
            value: resolve_value(&f.value, ctx)?,
            from: resolve_sender(f.from.as_ref(), ctx)?,
        },
        Future::ReadEventArgument(f) => ExecutionInputs::ReadEventArgument {
            artifact_id: f.emitter.clone(),
            emitter_address: future_address(&f.emitter, ctx)?,
            tx_hash: confirmed_hash(&f.future_to_read_from, ctx)?,
            event_name: f.event_name.clone(),
            name_or_index: f.name_or_index.clone(),
            event_index: f.event_index,
        },
        Future::EncodeFunctionCall(f) => ExecutionInputs::EncodeFunctionCall {
            artifact_id: f.contract.clone(),
            function_name: f.function_name.clone(),
            args: resolve_args(&f.args, ctx)?,
        },
    })
}
