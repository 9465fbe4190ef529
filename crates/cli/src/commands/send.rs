use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_runtime::Connection;

use super::{find_target, get_targets, parse_params};
use crate::cli::SendArgs;

pub async fn run(connection: &Arc<Connection>, args: SendArgs) -> Result<()> {
	let params = parse_params(args.params.as_deref())?;

	let result = match args.target {
		None => connection.send(&args.method, params).await?,
		Some(target_id) => {
			let target = find_target(get_targets(connection).await?, &target_id)?;
			let session = connection
				.create_session(&target)
				.await
				.with_context(|| format!("attaching to {target_id}"))?;
			tracing::info!(session_id = session.id(), target_type = session.target_type(), "Attached");

			let result = session.send(&args.method, params).await;
			if let Err(e) = session.detach().await {
				tracing::warn!(session_id = session.id(), error = %e, "Detach failed");
			}
			result?
		}
	};

	println!("{}", serde_json::to_string_pretty(&result)?);
	Ok(())
}
