//! CLI integration tests for the `hoist` binary.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes, stdout
//! content, and stderr content. Deployment directories are written into
//! temporary directories; nothing here talks to a live node.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn hoist() -> Command {
    cargo_bin_cmd!("hoist")
}

// ──────────────────────────────────────────────
// Test fixtures
// ──────────────────────────────────────────────

const TOKEN: &str = "0x1111111111111111111111111111111111111111";
const VAULT: &str = "0x2222222222222222222222222222222222222222";

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn vault_module(dir: &Path) -> PathBuf {
    write_json(
        dir,
        "module.json",
        &json!({
            "id": "M",
            "futures": [
                { "id": "Token", "type": "contract-deployment", "contractName": "Token",
                  "constructorArgs": [{ "$param": { "name": "supply" } }] },
                { "id": "Vault", "type": "contract-deployment", "contractName": "Vault",
                  "constructorArgs": [{ "$future": "Token" }] },
                { "id": "deposit", "type": "call", "contract": "Vault",
                  "functionName": "deposit", "args": [5] }
            ]
        }),
    )
}

fn cyclic_module(dir: &Path) -> PathBuf {
    write_json(
        dir,
        "cyclic.json",
        &json!({
            "id": "M",
            "futures": [
                { "id": "A", "type": "contract-deployment", "contractName": "A",
                  "constructorArgs": [], "after": ["B"] },
                { "id": "B", "type": "contract-deployment", "contractName": "B",
                  "constructorArgs": [], "after": ["A"] }
            ]
        }),
    )
}

fn contract_at(id: &str, name: &str, address: &str, dependencies: &[&str]) -> Vec<Value> {
    vec![
        json!({
            "type": "EXECUTION_STATE_INITIALIZE",
            "futureId": id,
            "dependencies": dependencies,
            "inputs": {
                "kind": "contract-at",
                "artifactId": id,
                "contractName": name,
                "address": address
            }
        }),
        json!({
            "type": "EXECUTION_STATE_COMPLETE",
            "futureId": id,
            "result": { "type": "SUCCESS", "value": { "type": "ADDRESS", "address": address } }
        }),
    ]
}

/// A deployment directory with two finished contract-at futures, the second
/// depending on the first.
fn recorded_deployment() -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut lines = vec![json!({ "type": "RUN_START", "chainId": 31337 })];
    lines.extend(contract_at("M#Token", "Token", TOKEN, &[]));
    lines.extend(contract_at("M#Vault", "Vault", VAULT, &["M#Token"]));
    let text: String = lines.iter().map(|l| format!("{}\n", l)).collect();
    fs::write(dir.path().join("journal.jsonl"), text).unwrap();
    dir
}

fn journal_lines(dir: &Path) -> Vec<Value> {
    fs::read_to_string(dir.join("journal.jsonl"))
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    hoist()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resumable smart-contract deployments"));
}

#[test]
fn version_exits_0() {
    hoist()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hoist"));
}

#[test]
fn deploy_requires_rpc_url() {
    hoist()
        .args(["deploy", "module.json", "--artifacts", "artifacts"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rpc-url"));
}

// ──────────────────────────────────────────────
// 2. Plan
// ──────────────────────────────────────────────

#[test]
fn plan_prints_batches_in_dependency_order() {
    let dir = TempDir::new().unwrap();
    let module = vault_module(dir.path());

    hoist()
        .arg("plan")
        .arg(&module)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 future(s) in 3 batch(es)"))
        .stdout(predicate::str::contains("batch 0:\n  M#Token (contract-deployment)"))
        .stdout(predicate::str::contains("batch 2:\n  M#deposit (call)"));
}

#[test]
fn plan_json_lists_batches() {
    let dir = TempDir::new().unwrap();
    let module = vault_module(dir.path());

    let out = hoist()
        .args(["--output", "json", "plan"])
        .arg(&module)
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["futures"], 3);
    assert_eq!(
        v["batches"],
        json!([["M#Token"], ["M#Vault"], ["M#deposit"]])
    );
}

#[test]
fn plan_reports_every_cycle_participant() {
    let dir = TempDir::new().unwrap();
    let module = cyclic_module(dir.path());

    hoist()
        .arg("plan")
        .arg(&module)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("dependency cycle detected"))
        .stderr(predicate::str::contains("[M#A, M#B]"));
}

#[test]
fn plan_missing_file_exits_1() {
    hoist()
        .args(["plan", "does/not/exist.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn plan_error_in_json_mode_is_json() {
    let out = hoist()
        .args(["--output", "json", "plan", "does/not/exist.json"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let v: Value = serde_json::from_slice(&out.stderr).unwrap();
    assert!(v["error"].as_str().unwrap().contains("exist.json"));
}

#[test]
fn quiet_suppresses_errors() {
    hoist()
        .args(["--quiet", "plan", "does/not/exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 3. Deploy (offline failures)
// ──────────────────────────────────────────────

#[test]
fn deploy_missing_parameter_fails_before_connecting() {
    let dir = TempDir::new().unwrap();
    let module = vault_module(dir.path());
    let deployment = dir.path().join("deployment");

    hoist()
        .arg("deploy")
        .arg(&module)
        .args(["--rpc-url", "http://127.0.0.1:1", "--artifacts"])
        .arg(dir.path())
        .arg("--deployment-dir")
        .arg(&deployment)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("parameter 'supply' of module 'M'"));
    assert!(!deployment.join("journal.jsonl").exists());
}

#[test]
fn deploy_rejects_bad_default_sender() {
    let dir = TempDir::new().unwrap();
    let module = vault_module(dir.path());

    hoist()
        .arg("deploy")
        .arg(&module)
        .args(["--rpc-url", "http://127.0.0.1:1", "--artifacts"])
        .arg(dir.path())
        .args(["--default-sender", "0x1234"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid --default-sender"));
}

#[test]
fn deploy_rejects_unknown_config_keys() {
    let dir = TempDir::new().unwrap();
    let module = vault_module(dir.path());
    let config = dir.path().join("hoist.toml");
    fs::write(&config, "requiredConfirmations = 1\nconfirmationz = 3\n").unwrap();

    hoist()
        .arg("deploy")
        .arg(&module)
        .args(["--rpc-url", "http://127.0.0.1:1", "--artifacts"])
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("confirmationz"));
}

#[test]
fn deploy_unreachable_node_exits_1() {
    let dir = TempDir::new().unwrap();
    let module = vault_module(dir.path());
    let params = write_json(dir.path(), "params.json", &json!({ "M": { "supply": 1000 } }));
    let config = dir.path().join("hoist.toml");
    fs::write(
        &config,
        "[retry]\nmaxAttempts = 1\ninitialBackoff = 1\nmaxBackoff = 1\n",
    )
    .unwrap();

    hoist()
        .arg("deploy")
        .arg(&module)
        .args(["--rpc-url", "http://127.0.0.1:1", "--artifacts"])
        .arg(dir.path())
        .arg("--parameters")
        .arg(&params)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error:"));
}

// ──────────────────────────────────────────────
// 4. Status
// ──────────────────────────────────────────────

#[test]
fn status_lists_recorded_futures() {
    let deployment = recorded_deployment();

    hoist()
        .arg("status")
        .arg(deployment.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("chain 31337"))
        .stdout(predicate::str::contains("SUCCESS   M#Token (contract-at)"))
        .stdout(predicate::str::contains(TOKEN))
        .stdout(predicate::str::contains("2 succeeded, 0 failed"));
}

#[test]
fn status_with_module_shows_unstarted_futures() {
    let deployment = recorded_deployment();
    let dir = TempDir::new().unwrap();
    let module = write_json(
        dir.path(),
        "module.json",
        &json!({
            "id": "M",
            "futures": [
                { "id": "Token", "type": "contract-at", "contractName": "Token", "address": TOKEN },
                { "id": "Vault", "type": "contract-at", "contractName": "Vault", "address": VAULT },
                { "id": "Other", "type": "contract-at", "contractName": "Other", "address": TOKEN }
            ]
        }),
    );

    let out = hoist()
        .args(["--output", "json", "status"])
        .arg(deployment.path())
        .arg("--module")
        .arg(&module)
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["chainId"], 31337);
    let statuses: Vec<(&str, &str)> = v["futures"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| (f["id"].as_str().unwrap(), f["status"].as_str().unwrap()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("M#Token", "SUCCESS"),
            ("M#Vault", "SUCCESS"),
            ("M#Other", "UNSTARTED")
        ]
    );
}

#[test]
fn status_without_journal_exits_1() {
    let dir = TempDir::new().unwrap();
    hoist()
        .arg("status")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no deployment found"));
}

// ──────────────────────────────────────────────
// 5. Wipe
// ──────────────────────────────────────────────

#[test]
fn wipe_removes_dependents_first() {
    let deployment = recorded_deployment();

    hoist()
        .arg("wipe")
        .arg(deployment.path())
        .arg("M#Token")
        .assert()
        .success()
        .stdout(predicate::str::contains("wiped M#Vault\nwiped M#Token"));

    let wipes: Vec<Value> = journal_lines(deployment.path())
        .into_iter()
        .filter(|l| l["type"] == "WIPE_APPLY")
        .map(|l| l["futureId"].clone())
        .collect();
    assert_eq!(wipes, vec![json!("M#Vault"), json!("M#Token")]);

    hoist()
        .arg("status")
        .arg(deployment.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 succeeded"));
}

#[test]
fn wipe_unknown_future_exits_1_without_writing() {
    let deployment = recorded_deployment();
    let before = journal_lines(deployment.path()).len();

    hoist()
        .arg("wipe")
        .arg(deployment.path())
        .arg("M#Nope")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("'M#Nope' has no execution state"));
    assert_eq!(journal_lines(deployment.path()).len(), before);
}

#[test]
fn wipe_json_lists_wiped_ids() {
    let deployment = recorded_deployment();

    let out = hoist()
        .args(["--output", "json", "wipe"])
        .arg(deployment.path())
        .arg("M#Vault")
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["wiped"], json!(["M#Vault"]));
}
