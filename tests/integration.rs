//! Integration tests for the forkpool CLI.
//!
//! These run the real binary, so every test forks real worker processes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// Get a command for the forkpool binary with a clean pool environment.
fn forkpool() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("forkpool").unwrap();
    for key in [
        "FORKPOOL_MAX_CHILDREN",
        "FORKPOOL_MAX_WAIT_TIME",
        "FORKPOOL_TRANSPORT",
        "FORKPOOL_SOCKET_DIR",
        "FORKPOOL_LOG",
        "FORKPOOL_LOG_FILE",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("NO_COLOR", "1");
    cmd.timeout(Duration::from_secs(60));
    cmd
}

fn stdout_lines(output: &std::process::Output) -> Vec<String> {
    let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}

#[test]
fn test_help() {
    forkpool()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("fetch"));
}

#[test]
fn test_version() {
    forkpool()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_color_env_accepts_conventional_values() {
    for value in ["1", "yes", "true", "0", ""] {
        forkpool()
            .env("NO_COLOR", value)
            .args(["exec", "--quiet", "echo hi"])
            .assert()
            .success()
            .stdout("hi\n");
    }
}

#[test]
fn test_exec_delivers_every_payload() {
    let output = forkpool()
        .args(["exec", "echo a", "echo bb", "printf ccc"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["a", "bb", "ccc"]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("3/3 delivered"));
}

#[test]
fn test_exec_quiet_has_no_summary() {
    forkpool()
        .args(["exec", "--quiet", "echo hi"])
        .assert()
        .success()
        .stdout("hi\n")
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_exec_lengths_format() {
    let output = forkpool()
        .args(["exec", "-f", "lengths", "printf abcd", "true"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["0", "4"]);
}

#[test]
fn test_exec_json_format() {
    let output = forkpool()
        .args(["exec", "--format", "json", "echo one", "echo two"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["report"]["units"], 2);
    assert_eq!(value["report"]["delivered"], 2);

    let mut texts: Vec<&str> = value["payloads"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["text"].as_str().unwrap())
        .collect();
    texts.sort();
    assert_eq!(texts, vec!["one", "two"]);
}

#[test]
fn test_negative_max_children_rejected() {
    forkpool()
        .args(["exec", "--max-children", "-1", "echo never"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Invalid argument"));
}

#[test]
fn test_negative_max_wait_time_from_env_rejected() {
    forkpool()
        .env("FORKPOOL_MAX_WAIT_TIME", "-3")
        .args(["exec", "echo never"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Invalid argument"));
}

#[test]
fn test_admission_limit_serializes_workers() {
    let start = Instant::now();
    let output = forkpool()
        .args([
            "exec",
            "-j",
            "1",
            "--poll-interval-ms",
            "20",
            "sleep 0.3; echo first",
            "sleep 0.3; echo second",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(start.elapsed() >= Duration::from_millis(600));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "first\nsecond\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("peak 1 workers"));
}

#[test]
fn test_overdue_worker_is_evicted() {
    let start = Instant::now();
    let output = forkpool()
        .args([
            "exec",
            "--max-wait-time",
            "1",
            "--poll-interval-ms",
            "50",
            "sleep 3; echo late",
            "echo early",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "early\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 evicted"), "stderr: {stderr}");
    // The orphaned `sleep` keeps stderr open until it exits.
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_rendezvous_transport() {
    let dir = tempdir().unwrap();
    let socket_dir = dir.path().join("sockets");

    let output = forkpool()
        .args(["exec", "--transport", "rendezvous", "--socket-dir"])
        .arg(&socket_dir)
        .args(["echo x", "echo y"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["x", "y"]);
    // Socket files are removed once each worker is collected.
    assert_eq!(std::fs::read_dir(&socket_dir).unwrap().count(), 0);
}

#[test]
fn test_fetch_unreachable_delivers_empty_payload() {
    forkpool()
        .args(["fetch", "--timeout", "2", "-f", "lengths", "http://127.0.0.1:9/"])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn test_log_file_receives_worker_warnings() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("pool.log");

    forkpool()
        .args(["exec", "--log-file"])
        .arg(&log)
        .arg("exit 4")
        .assert()
        .success();

    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("Command exited unsuccessfully"), "log: {contents}");
}

#[test]
fn test_completions_bash() {
    forkpool()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("forkpool"));
}
