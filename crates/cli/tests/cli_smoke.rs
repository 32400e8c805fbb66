// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI smoke tests
//!
//! These tests exercise argument parsing and the daemon-down paths. Anything
//! that needs a live daemon lives in the workspace-level spec tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct TestEnv {
    state: TempDir,
    sockets: TempDir,
    books: TempDir,
}

fn setup_env() -> TestEnv {
    TestEnv {
        state: TempDir::new().unwrap(),
        sockets: TempDir::new().unwrap(),
        books: TempDir::new().unwrap(),
    }
}

/// An adv command isolated from the user's real daemons
fn adv(env: &TestEnv) -> Command {
    let mut cmd = Command::cargo_bin("adv").unwrap();
    cmd.env("XDG_STATE_HOME", env.state.path())
        .env("ADV_SOCKET_DIR", env.sockets.path())
        .env("ADV_DATA_DIR", env.books.path());
    cmd
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("adv").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("available"))
        .stdout(predicate::str::contains("take"))
        .stdout(predicate::str::contains("repay"))
        .stdout(predicate::str::contains("settle"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("daemon"))
        .stdout(predicate::str::contains("completions"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn daemon_status_reports_not_running() {
    let env = setup_env();
    adv(&env)
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daemon not running"));
}

#[test]
fn daemon_stop_when_not_running() {
    let env = setup_env();
    adv(&env)
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daemon not running"));
}

#[test]
fn take_surfaces_daemon_start_failure() {
    let env = setup_env();
    adv(&env)
        .env("ADV_DAEMON_BINARY", "/nonexistent/advd")
        .args(["take", "u-1", "50"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to start daemon"));
}

#[test]
fn take_rejects_a_non_numeric_amount() {
    let env = setup_env();
    adv(&env)
        .args(["take", "u-1", "lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn completions_bash_mentions_the_binary() {
    let mut cmd = Command::cargo_bin("adv").unwrap();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("adv"));
}
