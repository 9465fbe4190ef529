//! Fake transport for testing request correlation and session routing.
//!
//! Provides an in-memory transport so the connection layer can be exercised
//! without a browser.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let connection = Arc::new(Connection::new("fake://", parts, ConnectionOptions::default()));
//! tokio::spawn({
//!     let conn = Arc::clone(&connection);
//!     async move { conn.run().await }
//! });
//!
//! let fut = connection.send("Browser.getVersion", json!({}));
//! controller.wait_for_sent(1).await;
//! controller.inject_response(1, json!({"product": "Chrome"}));
//! let result = fut.await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

/// Builder for fake transport instances.
#[derive(Debug, Default)]
pub struct FakeTransportBuilder {}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self {}
	}

	/// Builds the transport.
	///
	/// Returns [`TransportParts`] for a connection and a
	/// [`FakeTransportController`] for injecting inbound messages and
	/// inspecting sent ones.
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		let shared = Arc::new(Shared {
			sent: Mutex::new(Vec::new()),
			sent_notify: Notify::new(),
			inbound_tx: Mutex::new(Some(inbound_tx)),
			closed: AtomicBool::new(false),
		});

		let parts = TransportParts {
			sender: Box::new(FakeTransportSender {
				shared: Arc::clone(&shared),
			}),
			receiver: Box::new(FakeTransportReceiver {
				inbound_rx,
				message_tx,
			}),
			message_rx,
		};

		(parts, FakeTransportController { shared })
	}
}

struct Shared {
	sent: Mutex<Vec<Value>>,
	sent_notify: Notify,
	inbound_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
	closed: AtomicBool,
}

impl Shared {
	fn disconnect(&self) {
		self.inbound_tx.lock().take();
	}
}

/// Handle for driving the remote side of a fake transport.
#[derive(Clone)]
pub struct FakeTransportController {
	shared: Arc<Shared>,
}

impl FakeTransportController {
	/// Injects raw text as if the remote side had sent it.
	pub fn inject_raw(&self, text: impl Into<String>) {
		if let Some(tx) = self.shared.inbound_tx.lock().as_ref() {
			let _ = tx.send(text.into());
		}
	}

	/// Injects a JSON message.
	pub fn inject(&self, message: Value) {
		self.inject_raw(message.to_string());
	}

	/// Injects a success response for `id`.
	pub fn inject_response(&self, id: u64, result: Value) {
		self.inject(json!({ "id": id, "result": result }));
	}

	/// Injects a session-scoped success response for `id`.
	pub fn inject_session_response(&self, session_id: &str, id: u64, result: Value) {
		self.inject(json!({ "id": id, "sessionId": session_id, "result": result }));
	}

	/// Injects an error response for `id`.
	pub fn inject_error(&self, id: u64, code: i64, message: &str) {
		self.inject(json!({
			"id": id,
			"error": { "code": code, "message": message }
		}));
	}

	/// Injects a connection-level event.
	pub fn inject_event(&self, method: &str, params: Value) {
		self.inject(json!({ "method": method, "params": params }));
	}

	/// Injects an event scoped to `session_id`.
	pub fn inject_session_event(&self, session_id: &str, method: &str, params: Value) {
		self.inject(json!({ "sessionId": session_id, "method": method, "params": params }));
	}

	/// Injects an attach notification, optionally nested under `parent`.
	pub fn inject_attached(&self, parent: Option<&str>, session_id: &str, target_type: &str, target_id: &str) {
		let mut message = json!({
			"method": cdp_protocol::ATTACHED_TO_TARGET,
			"params": {
				"sessionId": session_id,
				"targetInfo": { "targetId": target_id, "type": target_type },
				"waitingForDebugger": false
			}
		});
		if let Some(parent) = parent {
			message["sessionId"] = Value::from(parent);
		}
		self.inject(message);
	}

	/// Injects a detach notification, optionally nested under `parent`.
	pub fn inject_detached(&self, parent: Option<&str>, session_id: &str) {
		let mut message = json!({
			"method": cdp_protocol::DETACHED_FROM_TARGET,
			"params": { "sessionId": session_id }
		});
		if let Some(parent) = parent {
			message["sessionId"] = Value::from(parent);
		}
		self.inject(message);
	}

	/// Simulates the remote side dropping the channel.
	pub fn disconnect(&self) {
		self.shared.disconnect();
	}

	/// Returns true once the local side has closed the transport.
	pub fn is_closed(&self) -> bool {
		self.shared.closed.load(Ordering::SeqCst)
	}

	/// Returns a copy of every message sent so far.
	pub fn sent(&self) -> Vec<Value> {
		self.shared.sent.lock().clone()
	}

	/// Returns the number of messages sent so far.
	pub fn sent_count(&self) -> usize {
		self.shared.sent.lock().len()
	}

	/// Takes all sent messages, clearing the buffer.
	pub fn take_sent(&self) -> Vec<Value> {
		std::mem::take(&mut *self.shared.sent.lock())
	}

	/// Waits until at least `count` messages have been sent, then returns them.
	pub async fn wait_for_sent(&self, count: usize) -> Vec<Value> {
		loop {
			let notified = self.shared.sent_notify.notified();
			{
				let sent = self.shared.sent.lock();
				if sent.len() >= count {
					return sent.clone();
				}
			}
			notified.await;
		}
	}
}

struct FakeTransportSender {
	shared: Arc<Shared>,
}

impl Transport for FakeTransportSender {
	fn send(&mut self, message: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let shared = Arc::clone(&self.shared);
		Box::pin(async move {
			if shared.closed.load(Ordering::SeqCst) {
				return Err(Error::Transport("fake transport is closed".to_string()));
			}
			let value = serde_json::from_str(&message).unwrap_or(Value::String(message));
			shared.sent.lock().push(value);
			shared.sent_notify.notify_waiters();
			Ok(())
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let shared = Arc::clone(&self.shared);
		Box::pin(async move {
			shared.closed.store(true, Ordering::SeqCst);
			shared.disconnect();
			Ok(())
		})
	}
}

struct FakeTransportReceiver {
	inbound_rx: mpsc::UnboundedReceiver<String>,
	message_tx: mpsc::UnboundedSender<String>,
}

impl TransportReceiver for FakeTransportReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(message) = self.inbound_rx.recv().await {
				if self.message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}
