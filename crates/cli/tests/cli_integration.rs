//! CLI integration tests for the `sigil` binary.
//!
//! Uses `assert_cmd` to spawn the binary against fixture files written
//! into a temporary directory, and checks exit codes, stdout and stderr.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn sigil() -> Command {
    let mut cmd = cargo_bin_cmd!("sigil");
    cmd.env_remove("SIGIL_LOG")
        .env_remove("SIGIL_MAX_RULE_DEPTH")
        .env_remove("SIGIL_RECORD_TRACE")
        .env_remove("SIGIL_ENTITY_NAMESPACE");
    cmd
}

/// Write a fixture file and return its path.
fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

fn write_json(dir: &TempDir, name: &str, value: serde_json::Value) -> PathBuf {
    write(dir, name, &value.to_string())
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    sigil()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sigil permission-rule toolchain"));
}

#[test]
fn version_exits_0() {
    sigil()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sigil"));
}

// ──────────────────────────────────────────────
// 2. validate
// ──────────────────────────────────────────────

#[test]
fn validate_accepts_well_formed_rule() {
    let dir = TempDir::new().unwrap();
    let rule = write_json(&dir, "rule.json", json!({"==": [{"var": "api.username"}, "alice"]}));
    sigil()
        .arg("validate")
        .arg(&rule)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn validate_rejects_wrong_modulo_arity() {
    let dir = TempDir::new().unwrap();
    let rule = write_json(&dir, "rule.json", json!({"%": [7, 3, 1]}));
    sigil()
        .arg("validate")
        .arg(&rule)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("expects exactly 2 operands"));
}

#[test]
fn validate_reports_unknown_operator_as_json() {
    let dir = TempDir::new().unwrap();
    let rule = write_json(&dir, "rule.json", json!({"frobnicate": [1]}));
    let output = sigil()
        .args(["--output", "json", "validate"])
        .arg(&rule)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(err["error"]
        .as_str()
        .unwrap()
        .contains("unsupported operator 'frobnicate'"));
}

#[test]
fn validate_respects_configured_depth() {
    let dir = TempDir::new().unwrap();
    let rule = write_json(&dir, "rule.json", json!({"!": [{"!": [{"!": [true]}]}]}));
    let config = write(&dir, "sigil.toml", "max_rule_depth = 2\n");
    sigil()
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .arg(&rule)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("maximum depth of 2"));
}

#[test]
fn env_override_applies_over_defaults() {
    let dir = TempDir::new().unwrap();
    let rule = write_json(&dir, "rule.json", json!({"!": [{"!": [true]}]}));
    sigil()
        .env("SIGIL_MAX_RULE_DEPTH", "1")
        .arg("validate")
        .arg(&rule)
        .assert()
        .code(1);
}

#[test]
fn missing_rule_file_exits_1() {
    sigil()
        .args(["validate", "/nonexistent/rule.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("rule file not found"));
}

// ──────────────────────────────────────────────
// 3. eval
// ──────────────────────────────────────────────

#[test]
fn eval_prints_result() {
    let dir = TempDir::new().unwrap();
    let rule = write_json(&dir, "rule.json", json!({"%": [{"var": "req.n"}, 3]}));
    let ctx = write_json(&dir, "ctx.json", json!({"req": {"n": 7}}));
    sigil()
        .arg("eval")
        .arg(&rule)
        .arg("--context")
        .arg(&ctx)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("1"));
}

#[test]
fn eval_json_with_trace() {
    let dir = TempDir::new().unwrap();
    let rule = write_json(&dir, "rule.json", json!({"and": [{"var": "missing.path"}, true]}));
    let ctx = write_json(&dir, "ctx.json", json!({"api": {"username": "alice"}}));
    let output = sigil()
        .args(["--output", "json", "eval"])
        .arg(&rule)
        .arg("--context")
        .arg(&ctx)
        .arg("--trace")
        .output()
        .unwrap();
    assert!(output.status.success());
    let out: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(out["result"], json!(false));
    assert_eq!(out["trace"]["accessed"][0]["path"], json!("missing.path"));
    assert_eq!(out["trace"]["accessed"][0]["value"], json!(null));
}

#[test]
fn eval_division_by_zero_exits_1() {
    let dir = TempDir::new().unwrap();
    let rule = write_json(&dir, "rule.json", json!({"%": [7, 0]}));
    let ctx = write_json(&dir, "ctx.json", json!({}));
    sigil()
        .arg("eval")
        .arg(&rule)
        .arg("--context")
        .arg(&ctx)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("division_by_zero"));
}

// ──────────────────────────────────────────────
// 4. check
// ──────────────────────────────────────────────

fn check_fixtures(dir: &TempDir, username: &str) -> (PathBuf, PathBuf, PathBuf) {
    let permissions = write_json(
        dir,
        "permissions.json",
        json!([
            {
                "id": "owner",
                "allow": [{"action": "read_state"}],
                "require": {"api.username": {"op": "==", "var": "$node.owner"}}
            },
            {
                "id": "valid_signature",
                "allow": [{"action": "link_to_anchor", "anchor": "#files"}],
                "require_logic": {"==": [{"var": "signature.log_code"}, null]}
            }
        ]),
    );
    let principals = write_json(
        dir,
        "principals.json",
        json!([
            {"kind": "api", "username": username},
            {"kind": "signature", "log_code": "certificate_not_valid", "indication": "total_failed"}
        ]),
    );
    let entity = write_json(
        dir,
        "entity.json",
        json!({"owner": {"kind": "identifier", "value": "alice"}}),
    );
    (permissions, principals, entity)
}

#[test]
fn check_grants_owner() {
    let dir = TempDir::new().unwrap();
    let (permissions, principals, entity) = check_fixtures(&dir, "alice");
    sigil()
        .arg("check")
        .arg(&permissions)
        .arg("--principals")
        .arg(&principals)
        .arg("--entity")
        .arg(&entity)
        .args(["--action", "read-state"])
        .assert()
        .success()
        .stdout(predicate::str::contains("granted by 'owner'"));
}

#[test]
fn check_denies_with_exit_2() {
    let dir = TempDir::new().unwrap();
    let (permissions, principals, entity) = check_fixtures(&dir, "bob");
    sigil()
        .arg("check")
        .arg(&permissions)
        .arg("--principals")
        .arg(&principals)
        .arg("--entity")
        .arg(&entity)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("denied"))
        .stdout(predicate::str::contains("valid_signature -> denied"));
}

#[test]
fn check_link_filters_by_anchor() {
    let dir = TempDir::new().unwrap();
    let (permissions, principals, entity) = check_fixtures(&dir, "alice");
    let output = sigil()
        .args(["--output", "json", "check"])
        .arg(&permissions)
        .arg("--principals")
        .arg(&principals)
        .arg("--entity")
        .arg(&entity)
        .args(["--action", "link-to-anchor", "--anchor", "#files"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let verdict: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(verdict["granted"], json!(false));
    let evaluations = verdict["evaluations"].as_array().unwrap();
    assert_eq!(evaluations.len(), 1);
    assert_eq!(evaluations[0]["permission"], json!("valid_signature"));
}

#[test]
fn check_allow_when_empty() {
    let dir = TempDir::new().unwrap();
    let (permissions, principals, _) = check_fixtures(&dir, "alice");
    sigil()
        .arg("check")
        .arg(&permissions)
        .arg("--principals")
        .arg(&principals)
        .args(["--action", "unlink-from-anchor", "--anchor", "#files", "--allow-when-empty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no permission applies"));
}

#[test]
fn check_allow_when_empty_never_grants_read_state() {
    let dir = TempDir::new().unwrap();
    let (_, principals, _) = check_fixtures(&dir, "alice");
    let permissions = write_json(
        &dir,
        "link_only.json",
        json!([{"allow": [{"action": "link_to_anchor", "anchor": "#files"}], "require_logic": true}]),
    );
    sigil()
        .arg("check")
        .arg(&permissions)
        .arg("--principals")
        .arg(&principals)
        .args(["--action", "read-state", "--allow-when-empty"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("denied"));
}

#[test]
fn check_rejects_bad_entity_field() {
    let dir = TempDir::new().unwrap();
    let (permissions, principals, _) = check_fixtures(&dir, "alice");
    let entity = write_json(&dir, "bad.json", json!({"credits": {"kind": "credits", "value": 0}}));
    sigil()
        .arg("check")
        .arg(&permissions)
        .arg("--principals")
        .arg(&principals)
        .arg("--entity")
        .arg(&entity)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("credits"));
}

#[test]
fn quiet_suppresses_output() {
    let dir = TempDir::new().unwrap();
    let (permissions, principals, entity) = check_fixtures(&dir, "bob");
    sigil()
        .arg("--quiet")
        .arg("check")
        .arg(&permissions)
        .arg("--principals")
        .arg(&principals)
        .arg("--entity")
        .arg(&entity)
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}
