use std::time::Duration;

use clap::Parser;

use super::*;

#[test]
fn parse_send_command() {
	let args = vec![
		"cdp-mux",
		"--url",
		"ws://127.0.0.1:9222/devtools/browser/abc",
		"send",
		"Runtime.evaluate",
		r#"{"expression":"1+1"}"#,
		"--target",
		"T1",
	];
	let cli = Cli::try_parse_from(args).unwrap();

	assert_eq!(cli.url.as_deref(), Some("ws://127.0.0.1:9222/devtools/browser/abc"));
	match cli.command {
		Commands::Send(args) => {
			assert_eq!(args.method, "Runtime.evaluate");
			assert_eq!(args.params.as_deref(), Some(r#"{"expression":"1+1"}"#));
			assert_eq!(args.target.as_deref(), Some("T1"));
		}
		_ => panic!("Expected Send command"),
	}
}

#[test]
fn parse_send_without_params() {
	let cli = Cli::try_parse_from(["cdp-mux", "send", "Browser.getVersion"]).unwrap();

	match cli.command {
		Commands::Send(args) => {
			assert_eq!(args.method, "Browser.getVersion");
			assert!(args.params.is_none());
			assert!(args.target.is_none());
		}
		_ => panic!("Expected Send command"),
	}
}

#[test]
fn parse_watch_events() {
	let cli = Cli::try_parse_from([
		"cdp-mux",
		"watch",
		"-e",
		"Target.targetCreated",
		"--event",
		"sessionattached",
		"--auto-attach",
	])
	.unwrap();

	match cli.command {
		Commands::Watch(args) => {
			assert_eq!(args.events, vec!["Target.targetCreated", "sessionattached"]);
			assert!(args.auto_attach);
		}
		_ => panic!("Expected Watch command"),
	}
}

#[test]
fn parse_global_flags_after_subcommand() {
	let cli = Cli::try_parse_from(["cdp-mux", "targets", "-vv", "--slow-mo", "50"]).unwrap();

	assert!(matches!(cli.command, Commands::Targets));
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.slow_mo, Some(50));
	assert_eq!(cli.connection_options().slow_mo, Duration::from_millis(50));
}

#[test]
fn parse_rejects_missing_subcommand() {
	assert!(Cli::try_parse_from(["cdp-mux"]).is_err());
}
