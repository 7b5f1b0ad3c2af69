//! The basic execution strategy: one network interaction per future.
//!
//! A strategy is pure. Given the resolved inputs, the execution state and
//! the contract material it decides the next interaction to request or the
//! result to complete with; the processor performs the network work.

use hoist_core::{Address, Bytes, ContractAbi, NameOrIndex};
use hoist_journal::{
    ExecutionInputs, ExecutionResult, FailureReason, NetworkInteraction, NetworkInteractionRequest,
    RawStaticCallResult, ResultValue, TransactionReceipt,
};
use serde_json::Value;

use crate::error::EngineError;
use crate::state::ExecutionState;

/// Contract material a step may need.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyContext<'a> {
    pub abi: Option<&'a ContractAbi>,
    /// Linked creation bytecode, for deployments.
    pub bytecode: Option<&'a Bytes>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyStep {
    Request(NetworkInteractionRequest),
    Complete(ExecutionResult),
}

fn failed(reason: FailureReason) -> StrategyStep {
    StrategyStep::Complete(ExecutionResult::Failed { reason })
}

fn succeeded(value: ResultValue) -> StrategyStep {
    StrategyStep::Complete(ExecutionResult::Success { value })
}

fn need<'a, T>(item: Option<&'a T>, what: &str, state: &ExecutionState) -> Result<&'a T, EngineError> {
    item.ok_or_else(|| {
        EngineError::invariant(format!("{} of {} was not loaded", what, state.id))
    })
}

/// Decide what `state` does next. Only called when the state has no
/// interaction yet or its last interaction has finished.
pub fn next_step(
    state: &ExecutionState,
    inputs: &ExecutionInputs,
    ctx: &StrategyContext<'_>,
) -> Result<StrategyStep, EngineError> {
    match state.last_interaction() {
        None => first_request(state, inputs, ctx),
        Some(NetworkInteraction::Onchain(onchain)) => match &onchain.receipt {
            Some(receipt) => Ok(complete_from_receipt(inputs, receipt)),
            None => Err(EngineError::invariant(format!(
                "{} has an unconfirmed interaction",
                state.id
            ))),
        },
        Some(NetworkInteraction::StaticCall(call)) => match &call.result {
            Some(result) => complete_static_call(state, inputs, result, ctx),
            None => Err(EngineError::invariant(format!(
                "{} has an unanswered static call",
                state.id
            ))),
        },
    }
}

fn first_request(
    state: &ExecutionState,
    inputs: &ExecutionInputs,
    ctx: &StrategyContext<'_>,
) -> Result<StrategyStep, EngineError> {
    const ID: u32 = 1;
    let step = match inputs {
        ExecutionInputs::ContractDeployment {
            constructor_args,
            value,
            from,
            ..
        } => {
            let abi = need(ctx.abi, "ABI", state)?;
            let bytecode = need(ctx.bytecode, "bytecode", state)?;
            match abi.encode_constructor(constructor_args) {
                Ok(encoded) => {
                    let mut data = bytecode.to_vec();
                    data.extend(encoded);
                    StrategyStep::Request(NetworkInteractionRequest::Onchain {
                        id: ID,
                        to: None,
                        data: Bytes::from(data),
                        value: *value,
                        from: *from,
                    })
                }
                Err(e) => failed(FailureReason::EncodingFailed {
                    message: format!("constructor arguments: {}", e),
                }),
            }
        }
        ExecutionInputs::LibraryDeployment { from, .. } => {
            let bytecode = need(ctx.bytecode, "bytecode", state)?;
            StrategyStep::Request(NetworkInteractionRequest::Onchain {
                id: ID,
                to: None,
                data: bytecode.clone(),
                value: Default::default(),
                from: *from,
            })
        }
        ExecutionInputs::Call {
            contract_address,
            function_name,
            args,
            value,
            from,
            ..
        } => {
            let abi = need(ctx.abi, "ABI", state)?;
            match encode_call(abi, function_name, args) {
                Ok(data) => StrategyStep::Request(NetworkInteractionRequest::Onchain {
                    id: ID,
                    to: Some(*contract_address),
                    data,
                    value: *value,
                    from: *from,
                }),
                Err(reason) => failed(reason),
            }
        }
        ExecutionInputs::StaticCall {
            contract_address,
            function_name,
            args,
            from,
            ..
        } => {
            let abi = need(ctx.abi, "ABI", state)?;
            match encode_call(abi, function_name, args) {
                Ok(data) => StrategyStep::Request(NetworkInteractionRequest::StaticCall {
                    id: ID,
                    to: *contract_address,
                    data,
                    value: Default::default(),
                    from: *from,
                }),
                Err(reason) => failed(reason),
            }
        }
        ExecutionInputs::SendData {
            to,
            data,
            value,
            from,
        } => StrategyStep::Request(NetworkInteractionRequest::Onchain {
            id: ID,
            to: Some(*to),
            data: data.clone(),
            value: *value,
            from: *from,
        }),
        ExecutionInputs::ContractAt { .. }
        | ExecutionInputs::ReadEventArgument { .. }
        | ExecutionInputs::EncodeFunctionCall { .. } => {
            return Err(EngineError::invariant(format!(
                "{} completes without network interactions",
                state.id
            )))
        }
    };
    Ok(step)
}

fn encode_call(abi: &ContractAbi, function_name: &str, args: &[Value]) -> Result<Bytes, FailureReason> {
    abi.function(function_name)
        .and_then(|f| f.encode_input(args))
        .map(Bytes::from)
        .map_err(|e| FailureReason::EncodingFailed {
            message: format!("{}: {}", function_name, e),
        })
}

fn complete_from_receipt(inputs: &ExecutionInputs, receipt: &TransactionReceipt) -> StrategyStep {
    if !receipt.status {
        return failed(FailureReason::Reverted {
            message: format!("reverted in block {}", receipt.block_number),
        });
    }
    match inputs {
        ExecutionInputs::ContractDeployment { .. } | ExecutionInputs::LibraryDeployment { .. } => {
            match receipt.contract_address {
                Some(address) => succeeded(ResultValue::Address { address }),
                None => failed(FailureReason::DecodingFailed {
                    message: "deployment receipt has no contract address".to_string(),
                }),
            }
        }
        _ => succeeded(ResultValue::None),
    }
}

fn complete_static_call(
    state: &ExecutionState,
    inputs: &ExecutionInputs,
    result: &RawStaticCallResult,
    ctx: &StrategyContext<'_>,
) -> Result<StrategyStep, EngineError> {
    let ExecutionInputs::StaticCall {
        function_name,
        name_or_index,
        ..
    } = inputs
    else {
        return Err(EngineError::invariant(format!(
            "{} made a static call but is not a static-call future",
            state.id
        )));
    };
    let abi = need(ctx.abi, "ABI", state)?;
    if !result.success {
        return Ok(failed(FailureReason::StaticCallFailed {
            message: abi.decode_revert(&result.return_data[..]),
        }));
    }
    let decoded = abi
        .function(function_name)
        .and_then(|f| f.output_value(&result.return_data[..], name_or_index));
    Ok(match decoded {
        Ok(value) => succeeded(ResultValue::Value { value }),
        Err(e) => failed(FailureReason::DecodingFailed {
            message: e.to_string(),
        }),
    })
}

// ──────────────────────────────────────────────
// Futures that complete without the network
// ──────────────────────────────────────────────

pub fn encode_function_call(abi: &ContractAbi, function_name: &str, args: &[Value]) -> ExecutionResult {
    match encode_call(abi, function_name, args) {
        Ok(data) => ExecutionResult::Success {
            value: ResultValue::Data { data },
        },
        Err(reason) => ExecutionResult::Failed { reason },
    }
}

/// Decode one argument of the `event_index`-th `event_name` log that
/// `emitter` wrote in `receipt`.
pub fn read_event_argument(
    abi: &ContractAbi,
    receipt: &TransactionReceipt,
    emitter: Address,
    event_name: &str,
    event_index: usize,
    name_or_index: &NameOrIndex,
) -> ExecutionResult {
    let fail = |message: String| ExecutionResult::Failed {
        reason: FailureReason::DecodingFailed { message },
    };
    let event = match abi.event(event_name) {
        Ok(event) => event,
        Err(e) => return fail(e.to_string()),
    };
    let topic = match event.topic() {
        Ok(topic) => topic,
        Err(e) => return fail(e.to_string()),
    };
    let log = receipt
        .logs
        .iter()
        .filter(|log| log.address == emitter)
        .filter(|log| event.anonymous || log.topics.first() == Some(&topic))
        .nth(event_index);
    let Some(log) = log else {
        return fail(format!(
            "no {} event #{} emitted by {} in transaction {}",
            event_name, event_index, emitter, receipt.transaction_hash
        ));
    };
    match event.argument(&log.topics, &log.data[..], name_or_index) {
        Ok(value) => ExecutionResult::Success {
            value: ResultValue::Value { value },
        },
        Err(e) => fail(e.to_string()),
    }
}
