#[cfg(test)]
mod tests;

use std::time::Duration;

use cdp_runtime::ConnectionOptions;
use clap::{Args, Parser, Subcommand};

/// Root CLI for cdp-mux.
#[derive(Parser, Debug)]
#[command(name = "cdp-mux")]
#[command(about = "Talk to a DevTools endpoint over one multiplexed connection")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv wire trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Browser-level WebSocket endpoint (ws://host:port/devtools/browser/<id>)
	#[arg(long, global = true, env = "CDP_MUX_URL", value_name = "URL")]
	pub url: Option<String>,

	/// Delay applied before dispatching each inbound message
	#[arg(long, global = true, value_name = "MS")]
	pub slow_mo: Option<u64>,

	#[command(subcommand)]
	pub command: Commands,
}

impl Cli {
	/// Connection options from `CDP_MUX_SLOW_MO_MS`, overridden by `--slow-mo`.
	pub fn connection_options(&self) -> ConnectionOptions {
		let options = ConnectionOptions::from_env();
		match self.slow_mo {
			Some(ms) => options.slow_mo(Duration::from_millis(ms)),
			None => options,
		}
	}
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Send one command and print its result.
	Send(SendArgs),
	/// List targets known to the browser.
	Targets,
	/// Print notifications as NDJSON until the connection closes.
	Watch(WatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
	/// Protocol method, e.g. Browser.getVersion
	#[arg(value_name = "METHOD")]
	pub method: String,

	/// JSON object of command parameters
	#[arg(value_name = "PARAMS")]
	pub params: Option<String>,

	/// Attach to this target and send through its session
	#[arg(long, value_name = "TARGET_ID")]
	pub target: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
	/// Event names to print (repeatable). Defaults to target lifecycle events.
	#[arg(short, long = "event", value_name = "NAME")]
	pub events: Vec<String>,

	/// Auto-attach to new targets in flat mode
	#[arg(long)]
	pub auto_attach: bool,
}
