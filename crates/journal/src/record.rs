use std::collections::BTreeMap;
use std::fmt;

use hoist_core::{Address, Bytes, FutureId, FutureKind, NameOrIndex, TxHash, Wei, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inputs of a future after every argument has been resolved against the
/// parameters, accounts and results of its dependencies.
///
/// `artifactId` names the future whose artifact supplies the ABI; it is
/// bookkeeping and not part of the future's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExecutionInputs {
    #[serde(rename_all = "camelCase")]
    ContractDeployment {
        artifact_id: FutureId,
        contract_name: String,
        constructor_args: Vec<Value>,
        #[serde(default)]
        libraries: BTreeMap<String, Address>,
        #[serde(default)]
        value: Wei,
        from: Address,
    },
    #[serde(rename_all = "camelCase")]
    LibraryDeployment {
        artifact_id: FutureId,
        contract_name: String,
        #[serde(default)]
        libraries: BTreeMap<String, Address>,
        from: Address,
    },
    #[serde(rename_all = "camelCase")]
    ContractAt {
        artifact_id: FutureId,
        contract_name: String,
        address: Address,
    },
    #[serde(rename_all = "camelCase")]
    Call {
        artifact_id: FutureId,
        contract_address: Address,
        function_name: String,
        args: Vec<Value>,
        #[serde(default)]
        value: Wei,
        from: Address,
    },
    #[serde(rename_all = "camelCase")]
    StaticCall {
        artifact_id: FutureId,
        contract_address: Address,
        function_name: String,
        args: Vec<Value>,
        #[serde(default)]
        name_or_index: NameOrIndex,
        from: Address,
    },
    #[serde(rename_all = "camelCase")]
    SendData {
        to: Address,
        #[serde(default)]
        data: Bytes,
        #[serde(default)]
        value: Wei,
        from: Address,
    },
    #[serde(rename_all = "camelCase")]
    ReadEventArgument {
        artifact_id: FutureId,
        emitter_address: Address,
        tx_hash: TxHash,
        event_name: String,
        #[serde(default)]
        name_or_index: NameOrIndex,
        #[serde(default)]
        event_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    EncodeFunctionCall {
        artifact_id: FutureId,
        function_name: String,
        args: Vec<Value>,
    },
}

impl ExecutionInputs {
    pub fn kind(&self) -> FutureKind {
        match self {
            ExecutionInputs::ContractDeployment { .. } => FutureKind::ContractDeployment,
            ExecutionInputs::LibraryDeployment { .. } => FutureKind::LibraryDeployment,
            ExecutionInputs::ContractAt { .. } => FutureKind::ContractAt,
            ExecutionInputs::Call { .. } => FutureKind::Call,
            ExecutionInputs::StaticCall { .. } => FutureKind::StaticCall,
            ExecutionInputs::SendData { .. } => FutureKind::SendData,
            ExecutionInputs::ReadEventArgument { .. } => FutureKind::ReadEventArgument,
            ExecutionInputs::EncodeFunctionCall { .. } => FutureKind::EncodeFunctionCall,
        }
    }

    /// The account that signs this future's transactions, if it sends any.
    pub fn sender(&self) -> Option<Address> {
        match self {
            ExecutionInputs::ContractDeployment { from, .. }
            | ExecutionInputs::LibraryDeployment { from, .. }
            | ExecutionInputs::Call { from, .. }
            | ExecutionInputs::StaticCall { from, .. }
            | ExecutionInputs::SendData { from, .. } => Some(*from),
            _ => None,
        }
    }
}

// ──────────────────────────────────────────────
// Network interactions
// ──────────────────────────────────────────────

/// Fee parameters of one transaction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NetworkFees {
    #[serde(rename_all = "camelCase")]
    Eip1559 {
        max_fee_per_gas: Wei,
        max_priority_fee_per_gas: Wei,
    },
    #[serde(rename_all = "camelCase")]
    Legacy { gas_price: Wei },
}

impl NetworkFees {
    /// The most this attempt can pay per unit of gas.
    pub fn max_price(&self) -> Wei {
        match self {
            NetworkFees::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
            NetworkFees::Legacy { gas_price } => *gas_price,
        }
    }
}

impl fmt::Display for NetworkFees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => write!(
                f,
                "maxFee {} / tip {}",
                max_fee_per_gas, max_priority_fee_per_gas
            ),
            NetworkFees::Legacy { gas_price } => write!(f, "gasPrice {}", gas_price),
        }
    }
}

/// One submitted attempt of an onchain interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: TxHash,
    pub fees: NetworkFees,
    /// Zero-based, strictly increasing per interaction.
    pub attempt: u32,
    /// Unix milliseconds.
    pub sent_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    #[serde(default)]
    pub block_hash: B256,
    /// False when the transaction reverted.
    pub status: bool,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

/// Raw output of an `eth_call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStaticCallResult {
    pub success: bool,
    #[serde(default)]
    pub return_data: Bytes,
}

/// A new interaction as requested by a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkInteractionRequest {
    #[serde(rename_all = "camelCase")]
    Onchain {
        id: u32,
        #[serde(default)]
        to: Option<Address>,
        #[serde(default)]
        data: Bytes,
        #[serde(default)]
        value: Wei,
        from: Address,
    },
    #[serde(rename_all = "camelCase")]
    StaticCall {
        id: u32,
        to: Address,
        #[serde(default)]
        data: Bytes,
        #[serde(default)]
        value: Wei,
        from: Address,
    },
}

impl NetworkInteractionRequest {
    pub fn id(&self) -> u32 {
        match self {
            NetworkInteractionRequest::Onchain { id, .. }
            | NetworkInteractionRequest::StaticCall { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainInteraction {
    pub id: u32,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub value: Wei,
    pub from: Address,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub receipt: Option<TransactionReceipt>,
    #[serde(default)]
    pub should_bump_fees: bool,
    #[serde(default)]
    pub dropped: bool,
}

impl OnchainInteraction {
    pub fn last_transaction(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    pub fn is_confirmed(&self) -> bool {
        self.receipt.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCallInteraction {
    pub id: u32,
    pub to: Address,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub value: Wei,
    pub from: Address,
    #[serde(default)]
    pub result: Option<RawStaticCallResult>,
}

/// An interaction as it lives inside an execution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkInteraction {
    Onchain(OnchainInteraction),
    StaticCall(StaticCallInteraction),
}

impl NetworkInteraction {
    pub fn id(&self) -> u32 {
        match self {
            NetworkInteraction::Onchain(i) => i.id,
            NetworkInteraction::StaticCall(i) => i.id,
        }
    }

    /// Whether the interaction has produced its outcome.
    pub fn is_finished(&self) -> bool {
        match self {
            NetworkInteraction::Onchain(i) => i.is_confirmed(),
            NetworkInteraction::StaticCall(i) => i.result.is_some(),
        }
    }
}

impl From<NetworkInteractionRequest> for NetworkInteraction {
    fn from(request: NetworkInteractionRequest) -> Self {
        match request {
            NetworkInteractionRequest::Onchain {
                id,
                to,
                data,
                value,
                from,
            } => NetworkInteraction::Onchain(OnchainInteraction {
                id,
                to,
                data,
                value,
                from,
                nonce: None,
                transactions: Vec::new(),
                receipt: None,
                should_bump_fees: false,
                dropped: false,
            }),
            NetworkInteractionRequest::StaticCall {
                id,
                to,
                data,
                value,
                from,
            } => NetworkInteraction::StaticCall(StaticCallInteraction {
                id,
                to,
                data,
                value,
                from,
                result: None,
            }),
        }
    }
}

// ──────────────────────────────────────────────
// Results
// ──────────────────────────────────────────────

/// What a successful future produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultValue {
    Address { address: Address },
    Value { value: Value },
    Data { data: Bytes },
    None,
}

impl ResultValue {
    /// The value as a future argument would consume it.
    pub fn as_argument(&self) -> Option<Value> {
        match self {
            ResultValue::Address { address } => Some(Value::String(address.to_string())),
            ResultValue::Value { value } => Some(value.clone()),
            ResultValue::Data { data } => Some(Value::String(data.to_string())),
            ResultValue::None => None,
        }
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            ResultValue::Address { address } => Some(*address),
            _ => None,
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Address { address } => write!(f, "{}", address),
            ResultValue::Value { value } => match value {
                Value::String(s) => f.write_str(s),
                other => write!(f, "{}", other),
            },
            ResultValue::Data { data } => write!(f, "{}", data),
            ResultValue::None => f.write_str("-"),
        }
    }
}

/// Why a future failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    Reverted { message: String },
    SimulationFailed { message: String },
    StaticCallFailed { message: String },
    DecodingFailed { message: String },
    EncodingFailed { message: String },
    NonceConsumedExternally { sender: Address, nonce: u64 },
    DependencyFailed { dependency: FutureId },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Reverted { message } => write!(f, "transaction {}", message),
            FailureReason::SimulationFailed { message } => {
                write!(f, "simulation failed: {}", message)
            }
            FailureReason::StaticCallFailed { message } => {
                write!(f, "static call {}", message)
            }
            FailureReason::DecodingFailed { message } => write!(f, "decoding failed: {}", message),
            FailureReason::EncodingFailed { message } => write!(f, "encoding failed: {}", message),
            FailureReason::NonceConsumedExternally { sender, nonce } => write!(
                f,
                "nonce {} of {} was used by a transaction this deployment did not send",
                nonce, sender
            ),
            FailureReason::DependencyFailed { dependency } => {
                write!(f, "dependency '{}' did not succeed", dependency)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionResult {
    Success { value: ResultValue },
    Failed { reason: FailureReason },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }
}
