//! Command dispatch.

mod send;
mod watch;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cdp_runtime::Connection;
use cdp_runtime::protocol::TargetInfo;
use serde::Deserialize;
use serde_json::Value;

use crate::cli::{Cli, Commands};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTargetsResult {
	target_infos: Vec<TargetInfo>,
}

pub async fn dispatch(cli: Cli) -> Result<()> {
	let Some(url) = cli.url.clone() else {
		bail!("no endpoint given: pass --url or set CDP_MUX_URL");
	};
	let options = cli.connection_options();

	tracing::info!(%url, slow_mo_ms = options.slow_mo.as_millis() as u64, "Connecting");
	let connection = Connection::connect(&url, options)
		.await
		.with_context(|| format!("connecting to {url}"))?;

	let outcome = match cli.command {
		Commands::Send(args) => send::run(&connection, args).await,
		Commands::Targets => list_targets(&connection).await,
		Commands::Watch(args) => watch::run(&connection, args).await,
	};

	connection.dispose();
	outcome
}

async fn list_targets(connection: &Arc<Connection>) -> Result<()> {
	for target in get_targets(connection).await? {
		println!("{}", serde_json::to_string(&target)?);
	}
	Ok(())
}

async fn get_targets(connection: &Connection) -> Result<Vec<TargetInfo>> {
	let result: GetTargetsResult = connection
		.send_as("Target.getTargets", Value::Object(Default::default()))
		.await
		.context("listing targets")?;
	Ok(result.target_infos)
}

/// Parses a command-line JSON argument; absent means an empty object.
fn parse_params(raw: Option<&str>) -> Result<Value> {
	let Some(raw) = raw else {
		return Ok(Value::Object(Default::default()));
	};
	let value: Value = serde_json::from_str(raw).context("params must be valid JSON")?;
	if !value.is_object() {
		bail!("params must be a JSON object, got {raw}");
	}
	Ok(value)
}

fn find_target(targets: Vec<TargetInfo>, target_id: &str) -> Result<TargetInfo> {
	targets
		.into_iter()
		.find(|t| t.target_id == target_id)
		.with_context(|| format!("no target with id {target_id}"))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn params_default_to_empty_object() {
		assert_eq!(parse_params(None).unwrap(), json!({}));
	}

	#[test]
	fn params_must_be_an_object() {
		assert_eq!(
			parse_params(Some(r#"{"url":"https://example.com"}"#)).unwrap(),
			json!({"url": "https://example.com"})
		);
		assert!(parse_params(Some("[1, 2]")).is_err());
		assert!(parse_params(Some("{oops")).is_err());
	}

	#[test]
	fn get_targets_result_parses() {
		let result: GetTargetsResult = serde_json::from_value(json!({
			"targetInfos": [
				{"targetId": "T1", "type": "page", "title": "Example", "url": "https://example.com/", "attached": false},
				{"targetId": "T2", "type": "service_worker", "title": "", "url": "", "attached": true}
			]
		}))
		.unwrap();

		let target = find_target(result.target_infos, "T2").unwrap();
		assert_eq!(target.target_type, "service_worker");
	}

	#[test]
	fn find_target_reports_missing_id() {
		let err = find_target(vec![TargetInfo::new("T1", "page")], "T9").unwrap_err();
		assert!(err.to_string().contains("T9"));
	}
}
