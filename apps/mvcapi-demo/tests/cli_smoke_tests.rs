#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the mvcapi-demo binary.

use std::io::Write;
use std::process::{Command, Stdio};

fn run_demo(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_mvcapi-demo"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute mvcapi-demo")
}

fn config_file(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn help_lists_subcommands() {
    let output = run_demo(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("check"));
    assert!(stdout.contains("--config"));
}

#[test]
fn check_accepts_valid_config() {
    let file = config_file(
        "problem_details:\n  xml_formatter: true\n  client_error_mapping:\n    \"404\":\n      title: \"Gone fishing\"\n",
    );
    let output = run_demo(&["--config", file.path().to_str().unwrap(), "check"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Configuration is valid"));
}

#[test]
fn check_rejects_bad_status_mapping() {
    let file = config_file("problem_details:\n  client_error_mapping:\n    \"abc\":\n      title: \"x\"\n");
    let output = run_demo(&["--config", file.path().to_str().unwrap(), "check"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid status code"));
}

#[test]
fn missing_config_file_fails() {
    let output = run_demo(&["--config", "/no/such/mvcapi.yaml", "check"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn print_config_shows_merged_values() {
    let file = config_file("server:\n  bind_addr: \"127.0.0.1:9999\"\n");
    let output = run_demo(&[
        "--config",
        file.path().to_str().unwrap(),
        "--print-config",
    ]);
    assert!(output.status.success());

    let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed["server"]["bind_addr"], "127.0.0.1:9999");
    assert_eq!(printed["problem_details"]["api_path_markers"][0], "api");
}
