//! Integration tests for the error messages printed by the binary.

use std::process::{Command, Output};

fn run(args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_cdp-mux"))
		.env_remove("CDP_MUX_URL")
		.env_remove("RUST_LOG")
		.args(args)
		.output()
		.expect("failed to execute cdp-mux")
}

#[test]
fn error_when_no_endpoint_is_given() {
	let output = run(&["send", "Browser.getVersion"]);

	assert!(!output.status.success());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("--url"), "expected hint about --url, got: {stderr}");
	assert!(stderr.contains("CDP_MUX_URL"), "expected hint about CDP_MUX_URL, got: {stderr}");
	assert!(output.stdout.is_empty());
}

#[test]
fn error_for_unreachable_endpoint_names_url() {
	let output = run(&["--url", "ws://127.0.0.1:1/devtools/browser/x", "targets"]);

	assert!(!output.status.success());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(
		stderr.contains("connecting to ws://127.0.0.1:1/devtools/browser/x"),
		"expected endpoint in error, got: {stderr}"
	);
	assert!(stderr.contains("Failed to connect"), "got: {stderr}");
}

#[test]
fn error_for_unknown_subcommand() {
	let output = run(&["navigate", "https://example.com"]);

	assert!(!output.status.success());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("navigate"), "got: {stderr}");
}
