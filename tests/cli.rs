//! Binary-level tests for the procrun CLI

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

use common::{create_config, SAMPLE_CONFIG};

fn procrun() -> Command {
    let mut cmd = Command::cargo_bin("procrun").unwrap();
    cmd.env_remove("PROCRUN_LOG");
    cmd
}

#[test]
fn test_run_prints_captured_output() {
    procrun()
        .args(["run", "-f", "plain", "--", "echo", "Hello World!"])
        .assert()
        .success()
        .stdout("Hello World!\n");
}

#[test]
fn test_run_table_reports_summary_on_stderr() {
    procrun()
        .args(["run", "--", "echo", "hi"])
        .assert()
        .success()
        .stdout("hi\n")
        .stderr(predicate::str::contains("'echo hi' exited 0"));
}

#[test]
fn test_run_mirrors_accepted_exit_code() {
    procrun()
        .args(["run", "--any-exit", "--", "sh", "-c", "exit 3"])
        .assert()
        .code(3);
}

#[test]
fn test_run_expected_exit_code() {
    procrun()
        .args(["run", "-e", "0", "-e", "4", "--", "sh", "-c", "exit 4"])
        .assert()
        .code(4);
}

#[test]
fn test_run_unexpected_exit_code_fails() {
    procrun()
        .args(["run", "--", "sh", "-c", "echo oops >&2; exit 2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("returned 2"))
        .stderr(predicate::str::contains("oops"));
}

#[test]
fn test_run_timeout() {
    procrun()
        .args(["run", "-t", "300", "--", "sleep", "5"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timed out after 300ms"))
        .stderr(predicate::str::contains("hint"));
}

#[test]
fn test_run_json_error_report() {
    procrun()
        .args(["run", "-f", "json", "--", "nonexistent_command_12345"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"error_type\": \"startup_failed\""))
        .stdout(predicate::str::contains("not found in PATH"));
}

#[test]
fn test_run_json_success() {
    procrun()
        .args(["run", "-f", "json", "--", "echo", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"exit_code\": 0"))
        .stdout(predicate::str::contains("\"stdout\": \"hi\\n\""));
}

#[test]
fn test_run_with_input_and_env() {
    procrun()
        .args([
            "run",
            "-f",
            "plain",
            "--env",
            "SUFFIX=!",
            "--input",
            "piped",
            "--",
            "sh",
            "-c",
            "cat; echo $SUFFIX",
        ])
        .assert()
        .success()
        .stdout("piped!\n");
}

#[test]
fn test_run_with_input_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("input.txt");
    std::fs::write(&input, "one two three").unwrap();

    procrun()
        .args(["run", "-f", "plain", "--input-file"])
        .arg(&input)
        .args(["--", "wc", "-w"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
}

#[test]
fn test_run_stream_passes_output_through() {
    procrun()
        .args(["run", "--stream", "-f", "plain", "--", "sh", "-c", "echo out; echo err >&2"])
        .assert()
        .success()
        .stdout("out\n")
        .stderr(predicate::str::contains("err"));
}

#[test]
fn test_run_working_directory() {
    procrun()
        .args(["run", "-f", "plain", "-d", "/", "--", "pwd"])
        .assert()
        .success()
        .stdout("/\n");
}

#[test]
fn test_profile_runs_with_merged_env() {
    let (_dir, config) = create_config(SAMPLE_CONFIG);

    procrun()
        .arg("-c")
        .arg(&config)
        .args(["profile", "greet", "-f", "plain"])
        .assert()
        .success()
        .stdout("hello world\n");
}

#[test]
fn test_profile_failure() {
    let (_dir, config) = create_config(SAMPLE_CONFIG);

    procrun()
        .arg("-c")
        .arg(&config)
        .args(["profile", "fail"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("boom"));
}

#[test]
fn test_profile_expected_exit_code() {
    let (_dir, config) = create_config(SAMPLE_CONFIG);

    procrun()
        .arg("-c")
        .arg(&config)
        .args(["profile", "tolerant"])
        .assert()
        .code(4);
}

#[test]
fn test_unknown_profile() {
    let (_dir, config) = create_config(SAMPLE_CONFIG);

    procrun()
        .arg("-c")
        .arg(&config)
        .args(["profile", "missing"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Profile 'missing' not found"))
        .stderr(predicate::str::contains("greet"));
}

#[test]
fn test_config_json() {
    let (_dir, config) = create_config(SAMPLE_CONFIG);

    procrun()
        .arg("-c")
        .arg(&config)
        .args(["config", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"timeout_ms\": 3000"))
        .stdout(predicate::str::contains("\"greet\""));
}

#[test]
fn test_config_table_lists_profiles() {
    let (_dir, config) = create_config(SAMPLE_CONFIG);

    procrun()
        .arg("-c")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("3000ms"))
        .stdout(predicate::str::contains("tolerant"));
}

#[test]
fn test_run_requires_command() {
    procrun().arg("run").assert().failure();
}

#[test]
fn test_config_defaults_accepting_any_exit_code() {
    let (_dir, config) = create_config("[defaults]\nexpected_exit_codes = []\n");

    procrun()
        .arg("-c")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("any"));

    procrun()
        .arg("-c")
        .arg(&config)
        .args(["run", "--", "sh", "-c", "exit 6"])
        .assert()
        .code(6);
}
