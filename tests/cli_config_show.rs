//! `config-show` never touches the network — it's the one CLI surface we
//! can exercise end-to-end as a black-box `assert_cmd` test without a live
//! Kubernetes/Prometheus/Alertmanager stack.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn config_show_table_format_prints_known_keys() {
    Command::cargo_bin("tarka-agent")
        .unwrap()
        .arg("config-show")
        .assert()
        .success()
        .stdout(predicate::str::contains("server.host"))
        .stdout(predicate::str::contains("queue.nats_url"))
        .stdout(predicate::str::contains("storage.backend"));
}

#[test]
fn config_show_json_format_is_valid_json() {
    let output = Command::cargo_bin("tarka-agent").unwrap().args(["config-show", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("config-show --format json must emit parseable JSON");
    assert!(value.get("server").is_some());
    assert!(value.get("queue").is_some());
}

#[test]
fn missing_subcommand_exits_nonzero_with_usage() {
    Command::cargo_bin("tarka-agent").unwrap().assert().failure().stderr(predicate::str::contains("Usage"));
}
