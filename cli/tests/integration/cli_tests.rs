//! Integration tests for the CLI skeleton: help, version and argument parsing.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn spawn() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("spawn"));
    cmd.env("NO_COLOR", "1");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    // clap with arg_required_else_help shows help on stderr and exits 2
    spawn().assert().code(2).stderr(predicate::str::contains(
        "Launch AI coding agents on any cloud",
    ));
}

#[test]
fn test_cli_help_lists_commands() {
    spawn()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("matrix"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    spawn()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("spawn"));
}

#[test]
fn test_version_command_shows_version() {
    spawn()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("spawn 0.1.0"));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let output = spawn()
        .args(["version", "--json"])
        .output()
        .expect("run spawn");
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version --json prints JSON");
    assert_eq!(value["version"], "0.1.0");
}

// --- Argument parsing ---

#[test]
fn test_run_requires_agent_and_cloud() {
    spawn()
        .args(["run", "claude"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("<CLOUD>"));
}

#[test]
fn test_run_headless_requires_a_prompt() {
    spawn()
        .args(["run", "claude", "local", "--headless"])
        .assert()
        .code(2);
}

#[test]
fn test_run_prompt_and_prompt_file_conflict() {
    spawn()
        .args([
            "run",
            "claude",
            "local",
            "--prompt",
            "hi",
            "--prompt-file",
            "task.md",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_unknown_subcommand_fails() {
    spawn().arg("deploy").assert().code(2);
}
