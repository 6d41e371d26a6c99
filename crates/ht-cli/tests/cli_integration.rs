//! CLI integration tests
//!
//! Tests the hitch CLI using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn hitch() -> Command {
    Command::cargo_bin("hitch")
        .expect("Failed to locate hitch binary - ensure it's built before running tests")
}

#[test]
fn test_cli_help() {
    hitch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("hitch"))
        .stdout(predicate::str::contains("Attach your terminal"));
}

#[test]
fn test_cli_version() {
    hitch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hitch"));
}

#[test]
fn test_run_help() {
    hitch()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--detach-keys"))
        .stdout(predicate::str::contains("--sig-proxy"));
}

#[test]
fn test_run_requires_command() {
    hitch().arg("run").assert().failure();
}

#[cfg(unix)]
mod unix {
    use super::*;

    #[test]
    fn test_run_relays_output() {
        hitch()
            .args(["run", "--", "sh", "-c", "echo hello; echo oops >&2"])
            .assert()
            .success()
            .stdout("hello\n")
            .stderr(predicate::str::contains("oops"));
    }

    #[test]
    fn test_run_propagates_exit_status() {
        hitch()
            .args(["run", "sh", "-c", "exit 7"])
            .assert()
            .code(7)
            .stderr(predicate::str::contains("exited").not());
    }

    #[test]
    fn test_run_forwards_stdin() {
        hitch()
            .args(["run", "-i", "cat"])
            .write_stdin("piped input\n")
            .assert()
            .success()
            .stdout("piped input\n");
    }

    #[test]
    fn test_run_passes_environment() {
        hitch()
            .args(["run", "-e", "GREETING=hi", "sh", "-c", "echo $GREETING"])
            .assert()
            .success()
            .stdout("hi\n");
    }

    #[test]
    fn test_run_missing_executable() {
        hitch()
            .args(["run", "--rm", "/nonexistent/hitch-test-binary"])
            .assert()
            .code(125)
            .stderr(predicate::str::contains("failed to start"));
    }

    #[test]
    fn test_interactive_tty_requires_terminal() {
        hitch()
            .args(["run", "-i", "-t", "sh"])
            .write_stdin("")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("the input device is not a TTY"));
    }
}

#[test]
fn test_config_path_honors_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");

    hitch()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_set_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    hitch()
        .arg("--config")
        .arg(&path)
        .args(["config", "set", "detach_keys", "ctrl-a,d"])
        .assert()
        .success();

    hitch()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("detach_keys = \"ctrl-a,d\""));
}

#[test]
fn test_config_set_rejects_invalid_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    hitch()
        .arg("--config")
        .arg(&path)
        .args(["config", "set", "detach_keys", "ctrl-1"])
        .assert()
        .failure();
    assert!(!path.exists());
}
