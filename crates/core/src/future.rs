//! Futures: the typed nodes of a deployment graph.
//!
//! A future is one declared unit of work. The set of kinds is closed and
//! modelled as a sum type, so every consumer matches exhaustively and adding
//! a kind is a compile-time-checked change.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::argument::Argument;

// ──────────────────────────────────────────────
// FutureId
// ──────────────────────────────────────────────

/// Stable identifier of a future: `<moduleId>#<localId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FutureId(String);

impl FutureId {
    pub fn new(module: &str, local: &str) -> Self {
        FutureId(format!("{}#{}", module, local))
    }

    /// Wrap an id verbatim, qualified or not.
    pub fn from_raw(raw: &str) -> Self {
        FutureId(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_qualified(&self) -> bool {
        self.0.contains('#')
    }

    /// The module part of a qualified id.
    pub fn module(&self) -> Option<&str> {
        self.0.split_once('#').map(|(m, _)| m)
    }

    /// Prefix with `module` unless already qualified.
    pub fn qualify(&self, module: &str) -> FutureId {
        if self.is_qualified() || module.is_empty() {
            self.clone()
        } else {
            FutureId::new(module, &self.0)
        }
    }
}

impl fmt::Display for FutureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FutureId {
    fn from(s: &str) -> Self {
        FutureId::from_raw(s)
    }
}

// ──────────────────────────────────────────────
// FutureKind
// ──────────────────────────────────────────────

/// Discriminant of [`Future`], used in journal records and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FutureKind {
    ContractDeployment,
    LibraryDeployment,
    ContractAt,
    Call,
    StaticCall,
    SendData,
    ReadEventArgument,
    EncodeFunctionCall,
}

impl FutureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FutureKind::ContractDeployment => "contract-deployment",
            FutureKind::LibraryDeployment => "library-deployment",
            FutureKind::ContractAt => "contract-at",
            FutureKind::Call => "call",
            FutureKind::StaticCall => "static-call",
            FutureKind::SendData => "send-data",
            FutureKind::ReadEventArgument => "read-event-argument",
            FutureKind::EncodeFunctionCall => "encode-function-call",
        }
    }

    /// Kinds whose result is a contract address.
    pub fn yields_contract(&self) -> bool {
        matches!(
            self,
            FutureKind::ContractDeployment | FutureKind::LibraryDeployment | FutureKind::ContractAt
        )
    }

    /// Kinds whose result can be consumed as an argument value.
    pub fn yields_value(&self) -> bool {
        match self {
            FutureKind::ContractDeployment
            | FutureKind::LibraryDeployment
            | FutureKind::ContractAt
            | FutureKind::StaticCall
            | FutureKind::ReadEventArgument
            | FutureKind::EncodeFunctionCall => true,
            FutureKind::Call | FutureKind::SendData => false,
        }
    }

    /// Kinds that send a transaction and therefore leave a receipt behind.
    pub fn sends_transaction(&self) -> bool {
        matches!(
            self,
            FutureKind::ContractDeployment
                | FutureKind::LibraryDeployment
                | FutureKind::Call
                | FutureKind::SendData
        )
    }
}

impl fmt::Display for FutureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects one output of a function or one argument of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameOrIndex {
    Index(usize),
    Name(String),
}

impl Default for NameOrIndex {
    fn default() -> Self {
        NameOrIndex::Index(0)
    }
}

impl fmt::Display for NameOrIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrIndex::Index(i) => write!(f, "{}", i),
            NameOrIndex::Name(n) => f.write_str(n),
        }
    }
}

// ──────────────────────────────────────────────
// Per-kind payloads
// ──────────────────────────────────────────────

fn zero_value() -> Argument {
    Argument::Literal(serde_json::Value::String("0".to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDeploymentFuture {
    pub id: FutureId,
    pub contract_name: String,
    #[serde(default)]
    pub constructor_args: Vec<Argument>,
    #[serde(default)]
    pub libraries: BTreeMap<String, FutureId>,
    #[serde(default = "zero_value")]
    pub value: Argument,
    #[serde(default)]
    pub from: Option<Argument>,
    #[serde(default)]
    pub after: Vec<FutureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDeploymentFuture {
    pub id: FutureId,
    pub contract_name: String,
    #[serde(default)]
    pub libraries: BTreeMap<String, FutureId>,
    #[serde(default)]
    pub from: Option<Argument>,
    #[serde(default)]
    pub after: Vec<FutureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAtFuture {
    pub id: FutureId,
    pub contract_name: String,
    pub address: Argument,
    #[serde(default)]
    pub after: Vec<FutureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFuture {
    pub id: FutureId,
    pub contract: FutureId,
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default = "zero_value")]
    pub value: Argument,
    #[serde(default)]
    pub from: Option<Argument>,
    #[serde(default)]
    pub after: Vec<FutureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCallFuture {
    pub id: FutureId,
    pub contract: FutureId,
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub name_or_index: NameOrIndex,
    #[serde(default)]
    pub from: Option<Argument>,
    #[serde(default)]
    pub after: Vec<FutureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDataFuture {
    pub id: FutureId,
    pub to: Argument,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default = "zero_value")]
    pub value: Argument,
    #[serde(default)]
    pub from: Option<Argument>,
    #[serde(default)]
    pub after: Vec<FutureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEventArgumentFuture {
    pub id: FutureId,
    /// Contract future whose ABI describes the event and whose address emitted it.
    pub emitter: FutureId,
    /// Transaction-sending future whose receipt holds the log.
    pub future_to_read_from: FutureId,
    pub event_name: String,
    #[serde(default)]
    pub name_or_index: NameOrIndex,
    #[serde(default)]
    pub event_index: usize,
    #[serde(default)]
    pub after: Vec<FutureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeFunctionCallFuture {
    pub id: FutureId,
    pub contract: FutureId,
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub after: Vec<FutureId>,
}

// ──────────────────────────────────────────────
// Future
// ──────────────────────────────────────────────

/// One node of the deployment graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Future {
    ContractDeployment(ContractDeploymentFuture),
    LibraryDeployment(LibraryDeploymentFuture),
    ContractAt(ContractAtFuture),
    Call(CallFuture),
    StaticCall(StaticCallFuture),
    SendData(SendDataFuture),
    ReadEventArgument(ReadEventArgumentFuture),
    EncodeFunctionCall(EncodeFunctionCallFuture),
}

/// How a future refers to another one; used to validate reference targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRole {
    /// Explicit ordering only (`after`).
    Ordering,
    /// An argument consuming the target's result.
    Value,
    /// A contract whose address and ABI are needed.
    Contract,
    /// A library linked into bytecode.
    Library,
    /// A future whose transaction receipt is read.
    Transaction,
}

/// An outgoing edge: which field, which target, in which role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: String,
    pub target: FutureId,
    pub role: ReferenceRole,
}

impl Future {
    pub fn id(&self) -> &FutureId {
        match self {
            Future::ContractDeployment(f) => &f.id,
            Future::LibraryDeployment(f) => &f.id,
            Future::ContractAt(f) => &f.id,
            Future::Call(f) => &f.id,
            Future::StaticCall(f) => &f.id,
            Future::SendData(f) => &f.id,
            Future::ReadEventArgument(f) => &f.id,
            Future::EncodeFunctionCall(f) => &f.id,
        }
    }

    pub fn kind(&self) -> FutureKind {
        match self {
            Future::ContractDeployment(_) => FutureKind::ContractDeployment,
            Future::LibraryDeployment(_) => FutureKind::LibraryDeployment,
            Future::ContractAt(_) => FutureKind::ContractAt,
            Future::Call(_) => FutureKind::Call,
            Future::StaticCall(_) => FutureKind::StaticCall,
            Future::SendData(_) => FutureKind::SendData,
            Future::ReadEventArgument(_) => FutureKind::ReadEventArgument,
            Future::EncodeFunctionCall(_) => FutureKind::EncodeFunctionCall,
        }
    }

    /// Name of the artifact this future needs, if any.
    pub fn contract_name(&self) -> Option<&str> {
        match self {
            Future::ContractDeployment(f) => Some(&f.contract_name),
            Future::LibraryDeployment(f) => Some(&f.contract_name),
            Future::ContractAt(f) => Some(&f.contract_name),
            _ => None,
        }
    }

    fn after(&self) -> &[FutureId] {
        match self {
            Future::ContractDeployment(f) => &f.after,
            Future::LibraryDeployment(f) => &f.after,
            Future::ContractAt(f) => &f.after,
            Future::Call(f) => &f.after,
            Future::StaticCall(f) => &f.after,
            Future::SendData(f) => &f.after,
            Future::ReadEventArgument(f) => &f.after,
            Future::EncodeFunctionCall(f) => &f.after,
        }
    }

    /// Every argument carried by this future, paired with its field path.
    pub fn arguments(&self) -> Vec<(String, &Argument)> {
        fn push_list<'a>(prefix: &str, args: &'a [Argument], out: &mut Vec<(String, &'a Argument)>) {
            for (i, a) in args.iter().enumerate() {
                out.push((format!("{}[{}]", prefix, i), a));
            }
        }

        let mut out: Vec<(String, &Argument)> = Vec::new();
        match self {
            Future::ContractDeployment(f) => {
                push_list("constructorArgs", &f.constructor_args, &mut out);
                out.push(("value".to_string(), &f.value));
                if let Some(from) = &f.from {
                    out.push(("from".to_string(), from));
                }
            }
            Future::LibraryDeployment(f) => {
                if let Some(from) = &f.from {
                    out.push(("from".to_string(), from));
                }
            }
            Future::ContractAt(f) => out.push(("address".to_string(), &f.address)),
            Future::Call(f) => {
                push_list("args", &f.args, &mut out);
                out.push(("value".to_string(), &f.value));
                if let Some(from) = &f.from {
                    out.push(("from".to_string(), from));
                }
            }
            Future::StaticCall(f) => {
                push_list("args", &f.args, &mut out);
                if let Some(from) = &f.from {
                    out.push(("from".to_string(), from));
                }
            }
            Future::SendData(f) => {
                out.push(("to".to_string(), &f.to));
                out.push(("value".to_string(), &f.value));
                if let Some(from) = &f.from {
                    out.push(("from".to_string(), from));
                }
            }
            Future::ReadEventArgument(_) => {}
            Future::EncodeFunctionCall(f) => push_list("args", &f.args, &mut out),
        }
        out
    }

    /// Every outgoing reference: explicit `after` edges, contract and library
    /// back-references, and `$future` arguments.
    pub fn references(&self) -> Vec<Reference> {
        let mut refs: Vec<Reference> = self
            .after()
            .iter()
            .map(|t| Reference {
                field: "after".to_string(),
                target: t.clone(),
                role: ReferenceRole::Ordering,
            })
            .collect();

        let libraries = match self {
            Future::ContractDeployment(f) => Some(&f.libraries),
            Future::LibraryDeployment(f) => Some(&f.libraries),
            _ => None,
        };
        if let Some(libraries) = libraries {
            for (name, target) in libraries {
                refs.push(Reference {
                    field: format!("libraries.{}", name),
                    target: target.clone(),
                    role: ReferenceRole::Library,
                });
            }
        }

        match self {
            Future::Call(f) => refs.push(contract_ref(&f.contract)),
            Future::StaticCall(f) => refs.push(contract_ref(&f.contract)),
            Future::EncodeFunctionCall(f) => refs.push(contract_ref(&f.contract)),
            Future::ReadEventArgument(f) => {
                refs.push(Reference {
                    field: "emitter".to_string(),
                    target: f.emitter.clone(),
                    role: ReferenceRole::Contract,
                });
                refs.push(Reference {
                    field: "futureToReadFrom".to_string(),
                    target: f.future_to_read_from.clone(),
                    role: ReferenceRole::Transaction,
                });
            }
            _ => {}
        }

        for (field, arg) in self.arguments() {
            let mut targets = BTreeSet::new();
            arg.future_refs(&mut targets);
            for target in targets {
                refs.push(Reference {
                    field: field.clone(),
                    target,
                    role: ReferenceRole::Value,
                });
            }
        }

        refs
    }

    /// Direct dependencies: the union of every reference target.
    pub fn dependencies(&self) -> BTreeSet<FutureId> {
        self.references().into_iter().map(|r| r.target).collect()
    }

    /// Qualify this future's id and every reference with `module`.
    pub fn qualify(&mut self, module: &str) {
        fn q(id: &mut FutureId, module: &str) {
            *id = id.qualify(module);
        }
        fn q_all(ids: &mut [FutureId], module: &str) {
            ids.iter_mut().for_each(|id| q(id, module));
        }
        fn q_args(args: &mut [Argument], module: &str) {
            args.iter_mut().for_each(|a| a.qualify(module));
        }
        fn q_libs(libs: &mut BTreeMap<String, FutureId>, module: &str) {
            libs.values_mut().for_each(|id| q(id, module));
        }
        fn q_from(from: &mut Option<Argument>, module: &str) {
            if let Some(a) = from {
                a.qualify(module);
            }
        }

        match self {
            Future::ContractDeployment(f) => {
                q(&mut f.id, module);
                q_args(&mut f.constructor_args, module);
                q_libs(&mut f.libraries, module);
                f.value.qualify(module);
                q_from(&mut f.from, module);
                q_all(&mut f.after, module);
            }
            Future::LibraryDeployment(f) => {
                q(&mut f.id, module);
                q_libs(&mut f.libraries, module);
                q_from(&mut f.from, module);
                q_all(&mut f.after, module);
            }
            Future::ContractAt(f) => {
                q(&mut f.id, module);
                f.address.qualify(module);
                q_all(&mut f.after, module);
            }
            Future::Call(f) => {
                q(&mut f.id, module);
                q(&mut f.contract, module);
                q_args(&mut f.args, module);
                f.value.qualify(module);
                q_from(&mut f.from, module);
                q_all(&mut f.after, module);
            }
            Future::StaticCall(f) => {
                q(&mut f.id, module);
                q(&mut f.contract, module);
                q_args(&mut f.args, module);
                q_from(&mut f.from, module);
                q_all(&mut f.after, module);
            }
            Future::SendData(f) => {
                q(&mut f.id, module);
                f.to.qualify(module);
                f.value.qualify(module);
                q_from(&mut f.from, module);
                q_all(&mut f.after, module);
            }
            Future::ReadEventArgument(f) => {
                q(&mut f.id, module);
                q(&mut f.emitter, module);
                q(&mut f.future_to_read_from, module);
                q_all(&mut f.after, module);
            }
            Future::EncodeFunctionCall(f) => {
                q(&mut f.id, module);
                q(&mut f.contract, module);
                q_args(&mut f.args, module);
                q_all(&mut f.after, module);
            }
        }
    }
}

fn contract_ref(target: &FutureId) -> Reference {
    Reference {
        field: "contract".to_string(),
        target: target.clone(),
        role: ReferenceRole::Contract,
    }
}
