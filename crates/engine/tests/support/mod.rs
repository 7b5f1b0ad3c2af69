//! In-process chain and fixtures shared by the engine integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use alloy_dyn_abi::DynSolValue;
use hoist_core::primitives::keccak256;
use hoist_core::{
    Address, Artifact, Bytes, Graph, MemoryArtifactResolver, ModuleDescription, TxHash, Wei, B256,
    U256,
};
use hoist_engine::network::{
    BlockTag, CallRequest, FeeData, JsonRpcClient, RpcError, RpcTransaction, TransactionRequest,
};
use hoist_engine::{Deployer, DeploymentLoader, EngineConfig, RetryConfig};
use hoist_journal::{Log, NetworkFees, RawStaticCallResult, TransactionReceipt};

pub const CHAIN_ID: u64 = 31337;
pub const BASE_FEE: u128 = 100;
pub const TIP: u128 = 10;

pub fn sender() -> Address {
    Address::repeat_byte(0x5e)
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature);
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn word(value: u128) -> Vec<u8> {
    DynSolValue::Uint(U256::from(value), 256).abi_encode()
}

fn error_string(reason: &str) -> Vec<u8> {
    let mut data = selector("Error(string)").to_vec();
    data.extend(DynSolValue::Tuple(vec![DynSolValue::String(reason.to_string())]).abi_encode_params());
    data
}

// ──────────────────────────────────────────────
// Fake chain
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PendingTx {
    hash: TxHash,
    request: TransactionRequest,
}

#[derive(Debug, Clone)]
struct KnownTx {
    nonce: u64,
    block_number: Option<u64>,
}

#[derive(Debug, Default)]
struct ChainState {
    chain_id: u64,
    automine: bool,
    min_fee: u128,
    block: u64,
    mined: HashMap<Address, u64>,
    mempool: BTreeMap<(Address, u64), PendingTx>,
    known: HashMap<TxHash, KnownTx>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    reverts: HashMap<[u8; 4], String>,
    returns: HashMap<[u8; 4], Vec<u8>>,
    events: HashMap<[u8; 4], (B256, Vec<u8>)>,
    failing_sends: usize,
    rejected_sends: usize,
    rejection: String,
    sent: Vec<(Address, u64)>,
}

impl ChainState {
    fn mined(&self, address: &Address) -> u64 {
        self.mined.get(address).copied().unwrap_or(0)
    }

    fn mine(&mut self) {
        loop {
            let next = self
                .mempool
                .iter()
                .find(|((from, nonce), tx)| {
                    *nonce == self.mined(from) && max_price(&tx.request.fees) >= self.min_fee
                })
                .map(|(key, _)| *key);
            let Some(key) = next else {
                break;
            };
            let Some(tx) = self.mempool.remove(&key) else {
                break;
            };
            self.block += 1;
            let request = &tx.request;
            let contract_address = match request.to {
                Some(_) => None,
                None => Some(request.from.create(request.nonce)),
            };
            let logs = request
                .to
                .and_then(|to| {
                    let sel = request.data.get(..4)?;
                    let (topic, data) = self.events.get(sel)?;
                    Some(vec![Log {
                        address: to,
                        topics: vec![*topic],
                        data: Bytes::from(data.clone()),
                    }])
                })
                .unwrap_or_default();
            self.receipts.insert(
                tx.hash,
                TransactionReceipt {
                    transaction_hash: tx.hash,
                    block_number: self.block,
                    block_hash: B256::new([self.block as u8; 32]),
                    status: true,
                    contract_address,
                    logs,
                },
            );
            if let Some(known) = self.known.get_mut(&tx.hash) {
                known.block_number = Some(self.block);
            }
            self.mined.insert(key.0, key.1 + 1);
        }
    }

    fn revert_reason(&self, to: Option<Address>, data: &Bytes) -> Option<&String> {
        to?;
        let sel = data.get(..4)?;
        self.reverts.get(sel)
    }
}

/// A single-node chain that mines in process. Transactions below the
/// minimum fee stay in the mempool until they are replaced.
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Arc<FakeChain> {
        Self::with_chain_id(CHAIN_ID)
    }

    pub fn with_chain_id(chain_id: u64) -> Arc<FakeChain> {
        Arc::new(FakeChain {
            state: Mutex::new(ChainState {
                chain_id,
                automine: true,
                ..ChainState::default()
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn set_automine(&self, on: bool) {
        self.lock().automine = on;
    }

    pub fn set_min_fee(&self, wei: u128) {
        self.lock().min_fee = wei;
    }

    /// Calls of `signature` revert with `reason`, in simulation and estimation.
    pub fn revert_on(&self, signature: &str, reason: &str) {
        self.lock()
            .reverts
            .insert(selector(signature), reason.to_string());
    }

    pub fn clear_reverts(&self) {
        self.lock().reverts.clear();
    }

    pub fn return_on(&self, signature: &str, data: Vec<u8>) {
        self.lock().returns.insert(selector(signature), data);
    }

    /// Mined calls of `signature` emit one `event` log with `data`.
    pub fn emit_on(&self, signature: &str, event: &str, data: Vec<u8>) {
        let topic = keccak256(event);
        self.lock().events.insert(selector(signature), (topic, data));
    }

    /// The next `count` submissions fail with HTTP 503.
    pub fn fail_sends(&self, count: usize) {
        self.lock().failing_sends = count;
    }

    /// The next `count` submissions are refused by the node with `message`,
    /// the way a sender without funds is.
    pub fn reject_sends(&self, count: usize, message: &str) {
        let mut state = self.lock();
        state.rejected_sends = count;
        state.rejection = message.to_string();
    }

    pub fn mine(&self) {
        self.lock().mine();
    }

    /// Forget every mempool transaction, as a node restart would.
    pub fn drop_pending(&self) {
        let mut state = self.lock();
        let pending: Vec<PendingTx> = std::mem::take(&mut state.mempool).into_values().collect();
        for tx in pending {
            state.known.remove(&tx.hash);
        }
    }

    /// Mine a foreign transaction with `address`'s next nonce, evicting
    /// whatever the mempool held for that slot.
    pub fn consume_nonce_externally(&self, address: Address) {
        let mut state = self.lock();
        let nonce = state.mined(&address);
        if let Some(tx) = state.mempool.remove(&(address, nonce)) {
            state.known.remove(&tx.hash);
        }
        state.block += 1;
        state.mined.insert(address, nonce + 1);
    }

    pub fn sends(&self) -> usize {
        self.lock().sent.len()
    }

    /// `(sender, nonce)` of every accepted submission, in order.
    pub fn submissions(&self) -> Vec<(Address, u64)> {
        self.lock().sent.clone()
    }

    pub fn pending(&self) -> usize {
        self.lock().mempool.len()
    }

    pub fn receipt_count(&self) -> usize {
        self.lock().receipts.len()
    }
}

#[async_trait]
impl JsonRpcClient for FakeChain {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(self.lock().chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        Ok(vec![sender(), Address::repeat_byte(0x6f)])
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        Ok(self.lock().block)
    }

    async fn call(&self, request: &CallRequest) -> Result<RawStaticCallResult, RpcError> {
        let state = self.lock();
        if let Some(reason) = state.revert_reason(request.to, &request.data) {
            return Ok(RawStaticCallResult {
                success: false,
                return_data: Bytes::from(error_string(reason)),
            });
        }
        let data = request
            .data
            .get(..4)
            .and_then(|sel| state.returns.get(sel))
            .cloned()
            .unwrap_or_default();
        Ok(RawStaticCallResult {
            success: true,
            return_data: Bytes::from(data),
        })
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError> {
        let state = self.lock();
        if let Some(reason) = state.revert_reason(request.to, &request.data) {
            return Err(RpcError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
                data: Some(json!(Bytes::from(error_string(reason)).to_string())),
            });
        }
        Ok(100_000)
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash, RpcError> {
        let mut state = self.lock();
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(RpcError::Http { status: 503 });
        }
        if state.rejected_sends > 0 {
            state.rejected_sends -= 1;
            return Err(RpcError::Rpc {
                code: -32000,
                message: state.rejection.clone(),
                data: None,
            });
        }
        if request.nonce < state.mined(&request.from) {
            return Err(RpcError::Rpc {
                code: -32000,
                message: "nonce too low".to_string(),
                data: None,
            });
        }
        let key = (request.from, request.nonce);
        if let Some(existing) = state.mempool.get(&key) {
            if request.fees.max_price() <= existing.request.fees.max_price() {
                return Err(RpcError::Rpc {
                    code: -32000,
                    message: "replacement transaction underpriced".to_string(),
                    data: None,
                });
            }
            let replaced = existing.hash;
            state.known.remove(&replaced);
        }

        let mut preimage = request.from.0.to_vec();
        preimage.extend(request.nonce.to_be_bytes());
        preimage.extend((state.sent.len() as u64).to_be_bytes());
        let hash = keccak256(&preimage);

        state.sent.push(key);
        state.known.insert(
            hash,
            KnownTx {
                nonce: request.nonce,
                block_number: None,
            },
        );
        state.mempool.insert(
            key,
            PendingTx {
                hash,
                request: request.clone(),
            },
        );
        if state.automine {
            state.mine();
        }
        Ok(hash)
    }

    async fn get_transaction(&self, hash: &TxHash) -> Result<Option<RpcTransaction>, RpcError> {
        Ok(self.lock().known.get(hash).map(|tx| RpcTransaction {
            hash: *hash,
            nonce: tx.nonce,
            block_number: tx.block_number,
        }))
    }

    async fn get_transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        Ok(self.lock().receipts.get(hash).cloned())
    }

    async fn get_transaction_count(
        &self,
        address: &Address,
        tag: BlockTag,
    ) -> Result<u64, RpcError> {
        let state = self.lock();
        let mined = state.mined(address);
        Ok(match tag {
            BlockTag::Latest => mined,
            BlockTag::Pending => {
                mined
                    + state
                        .mempool
                        .keys()
                        .filter(|(from, nonce)| from == address && *nonce >= mined)
                        .count() as u64
            }
        })
    }

    async fn network_fees(&self) -> Result<FeeData, RpcError> {
        Ok(FeeData {
            base_fee_per_gas: Some(Wei::new(BASE_FEE)),
            max_priority_fee_per_gas: Wei::new(TIP),
            gas_price: Wei::new(BASE_FEE + TIP),
        })
    }
}

pub fn max_price(fees: &NetworkFees) -> u128 {
    fees.max_price().0.saturating_to()
}

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

pub fn token_abi() -> Value {
    json!([
        { "type": "constructor", "stateMutability": "nonpayable",
          "inputs": [{ "name": "supply", "type": "uint256" }] },
        { "type": "function", "name": "get", "inputs": [],
          "outputs": [{ "name": "supply", "type": "uint256" }], "stateMutability": "view" },
        { "type": "function", "name": "ping", "inputs": [], "outputs": [],
          "stateMutability": "nonpayable" },
        { "type": "function", "name": "boom", "inputs": [], "outputs": [],
          "stateMutability": "nonpayable" },
        { "type": "function", "name": "transfer", "stateMutability": "nonpayable",
          "inputs": [{ "name": "to", "type": "address" }, { "name": "amount", "type": "uint256" }],
          "outputs": [{ "name": "", "type": "bool" }] },
        { "type": "event", "name": "Ping", "anonymous": false,
          "inputs": [{ "name": "value", "type": "uint256", "indexed": false }] }
    ])
}

pub fn vault_abi() -> Value {
    json!([
        { "type": "constructor", "stateMutability": "nonpayable",
          "inputs": [{ "name": "token", "type": "address" }] },
        { "type": "function", "name": "deposit", "stateMutability": "nonpayable",
          "inputs": [{ "name": "token", "type": "address" }, { "name": "amount", "type": "uint256" }],
          "outputs": [] }
    ])
}

pub fn artifact(name: &str, abi: Value) -> Artifact {
    Artifact {
        contract_name: name.to_string(),
        source_name: format!("contracts/{}.sol", name),
        abi,
        bytecode: "0x6080604052".to_string(),
        link_references: Default::default(),
    }
}

pub fn resolver() -> Arc<MemoryArtifactResolver> {
    let mut resolver = MemoryArtifactResolver::new();
    resolver.insert(artifact("Token", token_abi()));
    resolver.insert(artifact("Vault", vault_abi()));
    resolver.insert_build_info("Token", json!({ "solcVersion": "0.8.24" }));
    Arc::new(resolver)
}

pub fn graph(module: Value) -> Graph {
    Graph::from_module(ModuleDescription::from_json_str(&module.to_string()).unwrap()).unwrap()
}

/// Token, a Vault holding it, and a deposit of the Token into the Vault.
pub fn vault_module() -> Value {
    json!({
        "id": "M",
        "futures": [
            { "id": "Token", "type": "contract-deployment", "contractName": "Token",
              "constructorArgs": [1000] },
            { "id": "Vault", "type": "contract-deployment", "contractName": "Vault",
              "constructorArgs": [{ "$future": "Token" }] },
            { "id": "deposit", "type": "call", "contract": "Vault", "functionName": "deposit",
              "args": [{ "$future": "Token" }, 5] }
        ]
    })
}

/// Fast polling, one confirmation, no retries.
pub fn config() -> EngineConfig {
    EngineConfig {
        required_confirmations: 1,
        block_polling_interval: 1,
        retry: RetryConfig {
            max_attempts: 1,
            initial_backoff: 1,
            max_backoff: 1,
        },
        ..EngineConfig::default()
    }
}

pub fn deployer(
    chain: &Arc<FakeChain>,
    loader: Arc<dyn DeploymentLoader>,
    config: EngineConfig,
) -> Deployer {
    Deployer::new(chain.clone(), resolver(), loader, config)
}
