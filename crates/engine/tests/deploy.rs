//! End-to-end runs against the in-process chain.

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use hoist_core::FutureId;
use hoist_engine::{
    ChannelListener, DeploymentLoader, DeploymentState, EngineError, ExecutionEvent,
    ExecutionStatus, ExecutionStore, FileDeploymentLoader, FutureOutcome, MemoryDeploymentLoader,
    RunOptions, StatusReport, ValidationError,
};
use hoist_journal::{ExecutionResult, FailureReason, Journal, JournalMessage, ResultValue};

use support::*;

fn id(raw: &str) -> FutureId {
    FutureId::from_raw(raw)
}

#[tokio::test]
async fn dependent_futures_run_in_batches_and_record_addresses() {
    let chain = FakeChain::new();
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FileDeploymentLoader::new(dir.path()));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let report = deployer(&chain, loader.clone(), config())
        .with_listener(Arc::new(ChannelListener::new(tx)))
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();

    assert!(report.is_success(), "{}", report.to_text());
    assert_eq!(
        report.batches,
        vec![vec![id("M#Token")], vec![id("M#Vault")], vec![id("M#deposit")]]
    );
    assert_eq!(chain.sends(), 3);

    let addresses = loader.read_deployed_addresses().await.unwrap();
    assert_eq!(
        addresses.keys().cloned().collect::<Vec<_>>(),
        vec![id("M#Token"), id("M#Vault")]
    );

    // The Vault was constructed with the Token's address.
    let store = ExecutionStore::open(loader.clone()).await.unwrap();
    let state = store.snapshot().await;
    let token = addresses[&id("M#Token")];
    let vault = state.get(&id("M#Vault")).unwrap();
    match vault.inputs.as_ref().unwrap() {
        hoist_journal::ExecutionInputs::ContractDeployment {
            constructor_args, ..
        } => assert_eq!(constructor_args, &vec![json!(token.to_string())]),
        other => panic!("unexpected inputs {:?}", other),
    }

    assert!(dir.path().join("journal.jsonl").exists());
    assert!(dir.path().join("artifacts").join("M#Token.json").exists());
    assert!(dir.path().join("artifacts").join("M#Vault.json").exists());
    assert!(dir.path().join("build-info").join("Token.json").exists());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(
        events.first(),
        Some(ExecutionEvent::RunStarted { chain_id: CHAIN_ID, .. })
    ));
    let sent = events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::TransactionSent { .. }))
        .count();
    assert_eq!(sent, 3);
}

#[tokio::test]
async fn rerunning_a_finished_deployment_sends_nothing() {
    let chain = FakeChain::new();
    let loader = Arc::new(MemoryDeploymentLoader::new());

    deployer(&chain, loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();
    let sends = chain.sends();
    let journal_len = loader.memory_journal().len().await;

    let report = deployer(&chain, loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(report.batches.is_empty());
    assert_eq!(chain.sends(), sends);
    // Only the second RUN_START was appended.
    assert_eq!(loader.memory_journal().len().await, journal_len + 1);
}

#[tokio::test]
async fn concurrent_futures_of_one_sender_get_distinct_nonces() {
    let futures: Vec<_> = (0..6)
        .map(|i| {
            json!({ "id": format!("T{}", i), "type": "contract-deployment",
                    "contractName": "Token", "constructorArgs": [i] })
        })
        .collect();
    let module = json!({ "id": "M", "futures": futures });
    let chain = FakeChain::new();
    let loader = Arc::new(MemoryDeploymentLoader::new());

    let report = deployer(&chain, loader.clone(), config())
        .run(graph(module), RunOptions::default())
        .await
        .unwrap();

    assert!(report.is_success(), "{}", report.to_text());
    assert_eq!(report.batches.len(), 1);
    let nonces: BTreeSet<u64> = chain.submissions().iter().map(|(_, n)| *n).collect();
    assert_eq!(nonces, (0..6).collect());

    let prepared: BTreeSet<u64> = loader
        .journal()
        .replay()
        .await
        .unwrap()
        .iter()
        .filter_map(|m| match m {
            JournalMessage::TransactionPrepareSend { nonce, .. } => Some(*nonce),
            _ => None,
        })
        .collect();
    assert_eq!(prepared, nonces);
}

#[tokio::test]
async fn failures_propagate_to_dependents_only() {
    let chain = FakeChain::new();
    chain.revert_on("boom()", "not today");
    let module = json!({
        "id": "M",
        "futures": [
            { "id": "Token", "type": "contract-deployment", "contractName": "Token",
              "constructorArgs": [1] },
            { "id": "explode", "type": "call", "contract": "Token", "functionName": "boom" },
            { "id": "after", "type": "call", "contract": "Token", "functionName": "ping",
              "after": ["explode"] },
            { "id": "independent", "type": "call", "contract": "Token", "functionName": "ping" }
        ]
    });
    let loader = Arc::new(MemoryDeploymentLoader::new());

    let report = deployer(&chain, loader.clone(), config())
        .run(graph(module), RunOptions::default())
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(
        report.outcome(&id("M#explode")),
        Some(&FutureOutcome::Finished(ExecutionStatus::Failed))
    );
    assert_eq!(
        report.outcome(&id("M#after")),
        Some(&FutureOutcome::Finished(ExecutionStatus::Failed))
    );
    assert_eq!(
        report.outcome(&id("M#independent")),
        Some(&FutureOutcome::Finished(ExecutionStatus::Success))
    );

    let state = ExecutionStore::open(loader).await.unwrap().snapshot().await;
    assert_eq!(
        state.get(&id("M#explode")).unwrap().failure(),
        Some(&FailureReason::SimulationFailed {
            message: "reverted with reason 'not today'".into()
        })
    );
    assert_eq!(
        state.get(&id("M#after")).unwrap().failure(),
        Some(&FailureReason::DependencyFailed {
            dependency: id("M#explode")
        })
    );
    // The failed call never reached the mempool.
    assert_eq!(chain.sends(), 2);
}

#[tokio::test]
async fn static_calls_event_reads_and_encodings_complete() {
    let chain = FakeChain::new();
    chain.return_on("get()", word(42));
    chain.emit_on("ping()", "Ping(uint256)", word(7));
    let module = json!({
        "id": "M",
        "futures": [
            { "id": "Token", "type": "contract-deployment", "contractName": "Token",
              "constructorArgs": [1] },
            { "id": "ping", "type": "call", "contract": "Token", "functionName": "ping" },
            { "id": "pinged", "type": "read-event-argument", "emitter": "Token",
              "futureToReadFrom": "ping", "eventName": "Ping", "nameOrIndex": "value" },
            { "id": "supply", "type": "static-call", "contract": "Token", "functionName": "get" },
            { "id": "encoded", "type": "encode-function-call", "contract": "Token",
              "functionName": "transfer", "args": [{ "$account": 1 }, { "$future": "supply" }] }
        ]
    });
    let loader = Arc::new(MemoryDeploymentLoader::new());

    let report = deployer(&chain, loader.clone(), config())
        .run(graph(module), RunOptions::default())
        .await
        .unwrap();
    assert!(report.is_success(), "{}", report.to_text());

    let state = ExecutionStore::open(loader).await.unwrap().snapshot().await;
    assert_eq!(
        state.get(&id("M#pinged")).unwrap().success_value(),
        Some(&ResultValue::Value { value: json!("7") })
    );
    assert_eq!(
        state.get(&id("M#supply")).unwrap().success_value(),
        Some(&ResultValue::Value { value: json!("42") })
    );
    match state.get(&id("M#encoded")).unwrap().success_value() {
        Some(ResultValue::Data { data }) => {
            assert_eq!(&data[..4], &selector("transfer(address,uint256)"));
            assert_eq!(data.len(), 4 + 64);
        }
        other => panic!("unexpected result {:?}", other),
    }
    // Deploy and ping only; the rest never touch the mempool.
    assert_eq!(chain.sends(), 2);
}

#[tokio::test]
async fn changed_arguments_abort_before_writing() {
    let chain = FakeChain::new();
    let loader = Arc::new(MemoryDeploymentLoader::new());
    deployer(&chain, loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();
    let before = loader.memory_journal().len().await;
    let sends = chain.sends();

    let mut edited = vault_module();
    edited["futures"][0]["constructorArgs"] = json!([2000]);
    let err = deployer(&chain, loader.clone(), config())
        .run(graph(edited), RunOptions::default())
        .await
        .unwrap_err();

    match err {
        EngineError::Validation(ValidationError::Reconciliation { issues }) => {
            assert_eq!(issues.len(), 1);
            assert!(issues[0].starts_with("M#Token: constructorArgs"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(loader.memory_journal().len().await, before);
    assert_eq!(chain.sends(), sends);
}

#[tokio::test]
async fn new_futures_are_added_to_a_finished_deployment() {
    let chain = FakeChain::new();
    let loader = Arc::new(MemoryDeploymentLoader::new());
    deployer(&chain, loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();

    let mut extended = vault_module();
    extended["futures"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "id": "again", "type": "call", "contract": "Vault",
                      "functionName": "deposit", "args": [{ "$future": "Token" }, 6] }));
    let report = deployer(&chain, loader.clone(), config())
        .run(graph(extended), RunOptions::default())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.batches, vec![vec![id("M#again")]]);
    assert_eq!(chain.sends(), 4);
}

#[tokio::test]
async fn missing_parameter_is_reported_before_anything_is_written() {
    let module = json!({
        "id": "M",
        "futures": [
            { "id": "Token", "type": "contract-deployment", "contractName": "Token",
              "constructorArgs": [{ "$param": { "name": "supply" } }] }
        ]
    });
    let chain = FakeChain::new();
    let loader = Arc::new(MemoryDeploymentLoader::new());

    let err = deployer(&chain, loader.clone(), config())
        .run(graph(module.clone()), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::MissingParameter { ref name, .. }) if name == "supply"
    ));
    assert!(loader.memory_journal().is_empty().await);

    let mut options = RunOptions::default();
    options
        .parameters
        .insert("M".into(), [("supply".to_string(), json!(77))].into());
    let report = deployer(&chain, loader, config())
        .run(graph(module), options)
        .await
        .unwrap();
    assert!(report.is_success());
}

#[tokio::test]
async fn a_different_chain_is_refused() {
    let loader = Arc::new(MemoryDeploymentLoader::new());
    deployer(&FakeChain::new(), loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();

    let other = FakeChain::with_chain_id(1);
    let err = deployer(&other, loader, config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::ChainIdMismatch {
            journal: CHAIN_ID,
            node: 1
        })
    ));
    assert_eq!(other.sends(), 0);
}

#[tokio::test]
async fn wiping_a_failed_future_lets_it_run_again() {
    let chain = FakeChain::new();
    chain.revert_on("deposit(address,uint256)", "paused");
    let loader = Arc::new(MemoryDeploymentLoader::new());
    let report = deployer(&chain, loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(
        report.outcome(&id("M#deposit")),
        Some(&FutureOutcome::Finished(ExecutionStatus::Failed))
    );

    // Until it is wiped, the failure blocks the deployment.
    chain.clear_reverts();
    let err = deployer(&chain, loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("M#deposit: recorded as FAILED"));

    let store = ExecutionStore::open(loader.clone()).await.unwrap();
    let wiped = hoist_engine::wipe(&store, &id("M#deposit")).await.unwrap();
    assert_eq!(wiped, vec![id("M#deposit")]);

    let report = deployer(&chain, loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();
    assert!(report.is_success(), "{}", report.to_text());

    let state = ExecutionStore::open(loader).await.unwrap().snapshot().await;
    assert!(matches!(
        state.get(&id("M#deposit")).unwrap().result,
        Some(ExecutionResult::Success { .. })
    ));
}

#[tokio::test]
async fn dependents_are_initialized_only_after_their_dependencies_succeed() {
    let chain = FakeChain::new();
    let loader = Arc::new(MemoryDeploymentLoader::new());
    deployer(&chain, loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();
    let messages = loader.journal().replay().await.unwrap();

    let position = |wanted: &dyn Fn(&JournalMessage) -> bool| {
        messages
            .iter()
            .position(|m| wanted(m))
            .unwrap_or_else(|| panic!("message not journaled"))
    };
    let initialized = |raw: &'static str| {
        position(&move |m| {
            matches!(m, JournalMessage::ExecutionStateInitialize { future_id, .. } if *future_id == id(raw))
        })
    };
    let succeeded = |raw: &'static str| {
        position(&move |m| {
            matches!(
                m,
                JournalMessage::ExecutionStateComplete {
                    future_id,
                    result: ExecutionResult::Success { .. },
                } if *future_id == id(raw)
            )
        })
    };

    // deposit references both the Vault it calls and the Token it deposits.
    assert!(succeeded("M#Token") < initialized("M#Vault"));
    assert!(succeeded("M#Vault") < initialized("M#deposit"));
    assert!(succeeded("M#Token") < initialized("M#deposit"));

    let state = DeploymentState::fold(&messages).unwrap();
    let token = state.deployed_addresses()[&id("M#Token")];
    match state.get(&id("M#deposit")).unwrap().inputs.as_ref().unwrap() {
        hoist_journal::ExecutionInputs::Call { args, .. } => {
            assert_eq!(args, &vec![json!(token.to_string()), json!(5)])
        }
        other => panic!("unexpected inputs {:?}", other),
    }
}

#[tokio::test]
async fn every_journal_prefix_replays_to_the_same_state() {
    let chain = FakeChain::new();
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FileDeploymentLoader::new(dir.path()));
    deployer(&chain, loader.clone(), config())
        .run(graph(vault_module()), RunOptions::default())
        .await
        .unwrap();
    let messages = loader.journal().replay().await.unwrap();
    assert!(messages.len() > 10);

    for end in 0..=messages.len() {
        let prefix = &messages[..end];
        let first = DeploymentState::fold(prefix).unwrap();
        let second = DeploymentState::fold(prefix).unwrap();
        assert_eq!(first, second, "prefix of {} messages", end);

        let copy = tempfile::tempdir().unwrap();
        let lines: String = prefix
            .iter()
            .map(|m| format!("{}\n", m.to_line().unwrap()))
            .collect();
        std::fs::write(copy.path().join("journal.jsonl"), lines).unwrap();
        let reopened = ExecutionStore::open(Arc::new(FileDeploymentLoader::new(copy.path())))
            .await
            .unwrap()
            .snapshot()
            .await;
        assert_eq!(reopened, first, "prefix of {} messages", end);
    }

    let full = DeploymentState::fold(&messages).unwrap();
    let status = StatusReport::new(&full, Some(&graph(vault_module())));
    assert_eq!(status.count(ExecutionStatus::Success), 3);
}
