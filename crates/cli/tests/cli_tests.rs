//! CLI integration tests

use std::process::{Command, Output};

fn vtr(args: &[&str]) -> Output {
    let home = tempfile::tempdir().expect("Failed to create temp home");
    Command::new(env!("CARGO_BIN_EXE_vtr"))
        .args(args)
        .env("HOME", home.path())
        .env_remove("VTR_API_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = vtr(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Vehicle Telemetry Risk"),
        "Should show app name"
    );
    for command in ["risk", "history", "status", "retrain", "configure"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = vtr(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("vtr"), "Should show binary name");
}

/// Test risk subcommand help
#[test]
fn test_risk_help() {
    let output = vtr(&["risk", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Risk help should succeed");
    assert!(stdout.contains("--temperature"));
    assert!(stdout.contains("--humidity"));
    assert!(stdout.contains("--speed"));
}

/// Test history subcommand help
#[test]
fn test_history_help() {
    let output = vtr(&["history", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "History help should succeed");
    assert!(stdout.contains("--limit"), "Should show limit option");
}

/// Test format option
#[test]
fn test_format_option() {
    let output = vtr(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
}

/// Test api-url option
#[test]
fn test_api_url_option() {
    let output = vtr(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("VTR_API_URL"), "Should show env var");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = vtr(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test rejection of a non-numeric value
#[test]
fn test_non_numeric_speed() {
    let output = vtr(&["risk", "--speed", "fast"]);
    assert!(!output.status.success(), "Non-numeric speed should fail");
}

/// Test unreachable agent error handling
#[test]
fn test_unreachable_agent() {
    let output = vtr(&["--api-url", "http://127.0.0.1:1", "status"]);
    assert!(!output.status.success(), "Unreachable agent should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to send request"),
        "Should report the connection failure"
    );
}

/// Test invalid URL error handling
#[test]
fn test_invalid_api_url() {
    let output = vtr(&["--api-url", "not a url", "status"]);
    assert!(!output.status.success(), "Invalid URL should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid API URL"));
}
