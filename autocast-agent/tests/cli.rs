//! CLI tests for autocast-agent

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_scheduler_flags() {
    Command::cargo_bin("autocast-agent")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--poll-interval"))
        .stdout(predicate::str::contains("--once"))
        .stdout(predicate::str::contains("dedicated mode"));
}

#[test]
fn test_zero_poll_interval_is_invalid_input() {
    Command::cargo_bin("autocast-agent")
        .unwrap()
        .args(["--once", "--poll-interval", "0s"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("greater than zero"));
}

#[test]
fn test_unparseable_poll_interval_rejected_by_clap() {
    Command::cargo_bin("autocast-agent")
        .unwrap()
        .args(["--poll-interval", "soonish"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--poll-interval"));
}
