//! CLI integration tests

use std::process::Command;

fn run_cli(args: &[&str]) -> std::process::Output {
    let mut full_args = vec!["run", "-q", "-p", "flora-cli", "--"];
    full_args.extend_from_slice(args);
    Command::new("cargo")
        .args(&full_args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Flora plant identification"),
        "Should show app name"
    );
    assert!(stdout.contains("models"), "Should show models command");
    assert!(stdout.contains("stats"), "Should show stats command");
    assert!(stdout.contains("identify"), "Should show identify command");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_cli(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("flora"), "Should show binary name");
}

/// Test models list subcommand help
#[test]
fn test_models_list_help() {
    let output = run_cli(&["models", "list", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Models list help should succeed");
    assert!(
        stdout.contains("--active-only"),
        "Should show active-only option"
    );
}

/// Test models switch requires a key
#[test]
fn test_models_switch_requires_key() {
    let output = run_cli(&["models", "switch"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Switch without key should fail");
    assert!(stderr.contains("<KEY>"), "Should name the missing argument");
}

/// Test identify subcommand help
#[test]
fn test_identify_help() {
    let output = run_cli(&["identify", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Identify help should succeed");
    assert!(stdout.contains("<PATH>"), "Should show path argument");
}

/// Test identify with a missing file fails before contacting the server
#[test]
fn test_identify_missing_file() {
    let output = run_cli(&[
        "--api-url",
        "http://127.0.0.1:9",
        "identify",
        "/nonexistent/leaf.jpg",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing file should fail");
    assert!(stderr.contains("Failed to read"), "Should report the unreadable file");
}

/// Test invalid output format is rejected
#[test]
fn test_invalid_format() {
    let output = run_cli(&["--format", "xml", "stats"]);

    assert!(!output.status.success(), "Invalid format should fail");
}
