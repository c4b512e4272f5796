//! CLI integration tests

use std::process::Command;

fn ackv(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_ackv"))
        .args(args)
        .env_remove("ACKV_API_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = ackv(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("AckVision"), "Should show app name");
    for command in ["predict", "batch", "advise", "metrics", "health"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = ackv(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("ackv"), "Should show binary name");
}

/// Test predict subcommand help lists every student input
#[test]
fn test_predict_help() {
    let output = ackv(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for flag in [
        "--attendance",
        "--study-hours",
        "--assignment-score",
        "--previous-gpa",
        "--participation",
        "--internet-usage",
        "--sleep-hours",
        "--family-support",
        "--extra-curricular",
    ] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
    assert!(stdout.contains("Study hours per day"));
    assert!(!stdout.contains("Weekly"));
}

/// Test advise subcommand help
#[test]
fn test_advise_help() {
    let output = ackv(&["advise", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Advise help should succeed");
    assert!(stdout.contains("--pass-fail"));
    assert!(stdout.contains("--performance"));
    assert!(stdout.contains("--risk"));
}

/// Predict without its required inputs is a usage error
#[test]
fn test_predict_requires_inputs() {
    let output = ackv(&["predict", "--attendance", "85"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("--study-hours"));
}

/// Batch of a missing file fails before any request
#[test]
fn test_batch_missing_file() {
    let output = ackv(&[
        "--api-url",
        "http://127.0.0.1:9",
        "batch",
        "/nonexistent/students.csv",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to read"));
}
