use std::sync::Arc;

use anyhow::Result;
use cdp_runtime::{Connection, DISCONNECTED, Notification, SESSION_ATTACHED, SESSION_DETACHED};
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

use crate::cli::WatchArgs;

const DEFAULT_EVENTS: &[&str] = &[
	"Target.targetCreated",
	"Target.targetDestroyed",
	"Target.targetInfoChanged",
	SESSION_ATTACHED,
	SESSION_DETACHED,
];

pub async fn run(connection: &Arc<Connection>, args: WatchArgs) -> Result<()> {
	let events = if args.events.is_empty() {
		DEFAULT_EVENTS.iter().map(|e| e.to_string()).collect()
	} else {
		args.events
	};

	let (tx, mut rx) = mpsc::unbounded_channel();
	let _subscriptions: Vec<_> = events
		.into_iter()
		.map(|name| {
			let tx = tx.clone();
			let label = name.clone();
			connection.on(name, move |n: &Notification| {
				let _ = tx.send(render(&label, n));
			})
		})
		.collect();

	let closed = Arc::new(Notify::new());
	let _on_close = connection.on(DISCONNECTED, {
		let closed = Arc::clone(&closed);
		move |_: &Notification| closed.notify_one()
	});

	connection
		.send("Target.setDiscoverTargets", json!({"discover": true}))
		.await?;
	if args.auto_attach {
		connection
			.send(
				"Target.setAutoAttach",
				json!({"autoAttach": true, "waitForDebuggerOnStart": false, "flatten": true}),
			)
			.await?;
	}

	loop {
		tokio::select! {
			Some(line) = rx.recv() => println!("{line}"),
			_ = closed.notified() => {
				tracing::info!("Connection closed");
				break;
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Interrupted");
				break;
			}
		}
	}
	Ok(())
}

/// One NDJSON line per notification.
fn render(name: &str, notification: &Notification) -> Value {
	match notification {
		Notification::SessionAttached(session) | Notification::SessionDetached(session) => json!({
			"event": name,
			"sessionId": session.id(),
			"targetType": session.target_type(),
			"targetId": session.target_id(),
		}),
		Notification::Protocol { params, .. } => json!({"event": name, "params": params}),
		Notification::Disconnected => json!({"event": name}),
	}
}
