//! Multiplexed connection to a DevTools endpoint.
//!
//! This module implements request/response correlation and session routing on
//! top of a transport. It handles:
//! - Generating ids from one counter shared by the connection and every session
//! - Correlating responses with pending requests
//! - Materializing and tearing down sessions from attach/detach notifications
//! - Forwarding session-scoped traffic to the owning [`Session`]
//! - Rejecting every outstanding call when the transport closes
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send`] or [`Session::send`]
//! 2. The next id is assigned and the request is queued for the writer task
//!    under one lock, so wire order equals id order
//! 3. The owner registers a pending call and returns a [`ResponseFuture`]
//! 4. The reader task forwards inbound text to [`Connection::run`]
//! 5. The router settles the matching pending call, or creates/destroys a
//!    session, or emits an event
//! 6. When the transport terminates, closure rejects whatever is left

use std::collections::HashMap;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cdp_protocol::{
	ATTACH_TO_TARGET, ATTACHED_TO_TARGET, AttachToTarget, AttachToTargetResult, AttachedToTarget,
	DETACHED_FROM_TARGET, DetachedFromTarget, Envelope, Request, TargetInfo, is_structural,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::callbacks::{CallContext, CallbackTable, CancelGuard, PendingCall, ResponseFuture};
use crate::error::{Error, Result};
use crate::events::{
	DISCONNECTED, EventEmitter, Notification, SESSION_ATTACHED, SESSION_DETACHED, Subscription,
};
use crate::options::ConnectionOptions;
use crate::session::Session;
use crate::transport::{TransportParts, WebSocketTransport};

/// Work item for the writer task.
#[derive(Debug)]
enum Outbound {
	Message(String),
	Close,
}

struct ConnectionState {
	sessions: HashMap<String, Arc<Session>>,
	closed: bool,
}

/// Top-level multiplexer over one transport.
///
/// Owns every live [`Session`]; sessions hold only a weak reference back.
/// Shared as `Arc<Connection>`; [`run`](Self::run) must be driven for any
/// traffic to flow.
pub struct Connection {
	url: String,
	options: ConnectionOptions,
	/// Last id handed out; the first request gets 1.
	last_id: AtomicU64,
	calls: Arc<Mutex<CallbackTable>>,
	state: Mutex<ConnectionState>,
	outbound_tx: mpsc::UnboundedSender<Outbound>,
	/// Taken by `run()` to start the writer task.
	outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>,
	/// Taken by `run()`.
	transport: Mutex<Option<TransportParts>>,
	events: EventEmitter<Notification>,
}

impl Connection {
	/// Creates a connection over `parts`. Nothing is read or written until
	/// [`run`](Self::run) is driven.
	pub fn new(url: impl Into<String>, parts: TransportParts, options: ConnectionOptions) -> Self {
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		Self {
			url: url.into(),
			options,
			last_id: AtomicU64::new(0),
			calls: Arc::new(Mutex::new(CallbackTable::new())),
			state: Mutex::new(ConnectionState {
				sessions: HashMap::new(),
				closed: false,
			}),
			outbound_tx,
			outbound_rx: Mutex::new(Some(outbound_rx)),
			transport: Mutex::new(Some(parts)),
			events: EventEmitter::new(),
		}
	}

	/// Connects to a WebSocket endpoint and spawns the message loop.
	pub async fn connect(url: &str, options: ConnectionOptions) -> Result<Arc<Self>> {
		let (transport, message_rx) = WebSocketTransport::connect(url).await?;
		let connection = Arc::new(Self::new(
			url,
			transport.into_transport_parts(message_rx),
			options,
		));

		tokio::spawn({
			let connection = Arc::clone(&connection);
			async move { connection.run().await }
		});

		Ok(connection)
	}

	/// Returns the connection owning `session`, if it is still attached.
	pub fn from_session(session: &Session) -> Option<Arc<Connection>> {
		session.connection()
	}

	/// Endpoint this connection was created for.
	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn options(&self) -> &ConnectionOptions {
		&self.options
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	/// Number of connection-level calls awaiting a response.
	pub fn pending_count(&self) -> usize {
		self.calls.lock().len()
	}

	/// Sends a command and returns a future for its result.
	///
	/// After closure the returned future is already settled with
	/// [`Error::TargetClosed`] and nothing reaches the transport.
	#[track_caller]
	pub fn send(&self, method: &str, params: Value) -> ResponseFuture {
		let location = Location::caller();

		let mut calls = self.calls.lock();
		let id = match self.raw_send(method, params, None) {
			Ok(id) => id,
			Err(e) => return ResponseFuture::failed(e),
		};
		let (call, rx) = PendingCall::new(
			id,
			CallContext {
				method: method.to_string(),
				session_id: None,
				location,
			},
		);
		calls.insert(call);
		drop(calls);

		let guard = CancelGuard::for_table(id, &self.calls, CallbackTable::take);
		ResponseFuture::pending(id, rx, guard)
	}

	/// Typed variant of [`send`](Self::send).
	#[track_caller]
	pub fn send_as<P: Serialize, R: DeserializeOwned>(
		&self,
		method: &str,
		params: P,
	) -> impl Future<Output = Result<R>> + Send {
		let response = match serde_json::to_value(params) {
			Ok(params) => self.send(method, params),
			Err(e) => ResponseFuture::failed(e.into()),
		};
		async move { serde_json::from_value(response.await?).map_err(Error::from) }
	}

	/// Assigns the next id and queues the serialized request.
	///
	/// Used by the connection itself and, with `session_id`, by every
	/// session, so all of them share one id space. Fails without touching the
	/// transport once the connection is closed.
	pub fn raw_send(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<u64> {
		let state = self.state.lock();
		if state.closed {
			return Err(self.closed_error(method));
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
		let request = Request {
			id,
			method: method.to_string(),
			params,
			session_id: session_id.map(str::to_string),
		};
		let text = serde_json::to_string(&request)?;

		tracing::debug!(id, method, session_id, "Sending request");
		tracing::trace!(target: "cdp_runtime::wire", "SEND ► {}", text);

		if self.outbound_tx.send(Outbound::Message(text)).is_err() {
			tracing::error!("Failed to queue message: writer task has stopped");
			return Err(self.closed_error(method));
		}
		drop(state);

		Ok(id)
	}

	/// Returns the live session registered under `id`.
	pub fn session(&self, id: &str) -> Option<Arc<Session>> {
		self.state.lock().sessions.get(id).cloned()
	}

	/// Snapshot of every live session.
	pub fn sessions(&self) -> Vec<Arc<Session>> {
		self.state.lock().sessions.values().cloned().collect()
	}

	/// Attaches to `target` in flat mode and returns the new session.
	///
	/// The attach notification always precedes the attach response, so the
	/// session is registered by the time the response arrives. If it is not,
	/// this fails with [`Error::SessionCreation`].
	pub async fn create_session(&self, target: &TargetInfo) -> Result<Arc<Session>> {
		let params = AttachToTarget {
			target_id: target.target_id.clone(),
			flatten: true,
		};
		let result: AttachToTargetResult = self.send_as(ATTACH_TO_TARGET, params).await?;

		self.session(&result.session_id)
			.ok_or(Error::SessionCreation {
				session_id: result.session_id,
			})
	}

	/// Registers `listener` for `name` on this connection.
	pub fn on<F>(&self, name: impl Into<String>, listener: F) -> Subscription
	where
		F: Fn(&Notification) + Send + Sync + 'static,
	{
		self.events.on(name, listener)
	}

	/// Closes the connection, then asks the transport to close.
	pub fn dispose(&self) {
		self.on_close();
		let _ = self.outbound_tx.send(Outbound::Close);
	}

	/// Runs the transport reader, writer and message router until the
	/// transport terminates, then closes the connection.
	pub async fn run(self: &Arc<Self>) {
		let Some(parts) = self.transport.lock().take() else {
			tracing::warn!("Connection::run called more than once");
			return;
		};
		let Some(mut outbound_rx) = self.outbound_rx.lock().take() else {
			tracing::warn!("Connection::run called more than once");
			return;
		};
		let TransportParts {
			mut sender,
			receiver,
			mut message_rx,
		} = parts;

		let reader_handle = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				tracing::error!("Transport read error: {}", e);
			}
		});

		let writer_handle = tokio::spawn(async move {
			while let Some(outbound) = outbound_rx.recv().await {
				match outbound {
					Outbound::Message(text) => {
						if let Err(e) = sender.send(text).await {
							tracing::error!("Transport write error: {}", e);
							break;
						}
					}
					Outbound::Close => {
						if let Err(e) = sender.close().await {
							tracing::debug!("Transport close error: {}", e);
						}
						break;
					}
				}
			}
		});

		while let Some(text) = message_rx.recv().await {
			if !self.options.slow_mo.is_zero() {
				tokio::time::sleep(self.options.slow_mo).await;
			}
			self.on_message(&text);
		}

		tracing::debug!(url = %self.url, "Transport terminated");
		self.on_close();
		let _ = self.outbound_tx.send(Outbound::Close);

		let _ = reader_handle.await;
		let _ = writer_handle.await;
	}

	/// Routes one inbound message. Runs to completion before the next one.
	fn on_message(self: &Arc<Self>, text: &str) {
		if self.is_closed() {
			tracing::debug!("Message after close (ignored)");
			return;
		}
		tracing::trace!(target: "cdp_runtime::wire", "◀ RECV {}", text);

		let envelope: Envelope = match serde_json::from_str(text) {
			Ok(envelope) => envelope,
			Err(e) => {
				tracing::error!("Failed to parse message: {}", e);
				return;
			}
		};

		if let Some(method) = envelope.method.as_deref().filter(|m| is_structural(m)) {
			let handled = if method == ATTACHED_TO_TARGET {
				self.handle_attached(&envelope)
			} else {
				self.handle_detached(&envelope)
			};
			if let Err(e) = handled {
				tracing::error!("Error handling {}: {}", method, e);
			}
		}

		if let Some(session_id) = envelope.session_id.clone() {
			match self.session(&session_id) {
				Some(session) => session.on_message(envelope),
				None => tracing::debug!(
					session_id,
					method = envelope.method.as_deref(),
					"Message for unknown session (ignored)"
				),
			}
		} else if let Some(id) = envelope.id {
			let call = self.calls.lock().take(id);
			match call {
				Some(call) => {
					tracing::debug!(id, method = call.method(), "Settling response");
					call.settle(envelope.result, envelope.error);
				}
				None => tracing::warn!(id, "Response for unknown request id (ignored)"),
			}
		} else if let Some(method) = envelope.method {
			let notification = Notification::Protocol {
				method: method.clone(),
				params: envelope.params.unwrap_or(Value::Null),
			};
			self.events.emit(&method, &notification);
		} else {
			tracing::debug!("Message with neither id nor method (ignored)");
		}
	}

	/// Handles `Target.attachedToTarget`.
	fn handle_attached(self: &Arc<Self>, envelope: &Envelope) -> Result<()> {
		let attached: AttachedToTarget = parse_params(envelope, ATTACHED_TO_TARGET)?;
		let session = Arc::new(Session::new(
			attached.session_id.clone(),
			&attached.target_info,
			Arc::downgrade(self),
		));

		let replaced = {
			let mut state = self.state.lock();
			// Closure may have run after the router's check.
			if state.closed {
				tracing::debug!(session_id = %attached.session_id, "Attach after close (ignored)");
				return Ok(());
			}
			state
				.sessions
				.insert(attached.session_id.clone(), Arc::clone(&session))
		};
		let parent = self.parent_of(envelope);

		if let Some(previous) = replaced {
			tracing::warn!(
				session_id = %attached.session_id,
				"Duplicate attach notification; closing the previous session"
			);
			previous.on_close();
			let notification = Notification::SessionDetached(previous);
			self.events.emit(SESSION_DETACHED, &notification);
			if let Some(parent) = &parent {
				parent.emit(SESSION_DETACHED, &notification);
			}
		}

		tracing::debug!(
			session_id = %attached.session_id,
			target_type = %attached.target_info.target_type,
			target_id = %attached.target_info.target_id,
			parent = envelope.session_id.as_deref(),
			"Session attached"
		);

		let notification = Notification::SessionAttached(session);
		self.events.emit(SESSION_ATTACHED, &notification);
		if let Some(parent) = parent {
			parent.emit(SESSION_ATTACHED, &notification);
		}
		Ok(())
	}

	/// Handles `Target.detachedFromTarget`.
	fn handle_detached(&self, envelope: &Envelope) -> Result<()> {
		let detached: DetachedFromTarget = parse_params(envelope, DETACHED_FROM_TARGET)?;

		let Some(session) = self.session(&detached.session_id) else {
			tracing::debug!(
				session_id = %detached.session_id,
				"Detach for unknown session (ignored)"
			);
			return Ok(());
		};

		session.on_close();
		self.state.lock().sessions.remove(&detached.session_id);

		tracing::debug!(
			session_id = %detached.session_id,
			parent = envelope.session_id.as_deref(),
			"Session detached"
		);

		let notification = Notification::SessionDetached(session);
		self.events.emit(SESSION_DETACHED, &notification);
		if let Some(parent) = self.parent_of(envelope) {
			parent.emit(SESSION_DETACHED, &notification);
		}
		Ok(())
	}

	fn parent_of(&self, envelope: &Envelope) -> Option<Arc<Session>> {
		envelope.session_id.as_deref().and_then(|id| self.session(id))
	}

	/// Closes the connection. Idempotent.
	///
	/// Rejects every pending call, closes every live session and emits
	/// [`DISCONNECTED`].
	fn on_close(&self) {
		let sessions = {
			let mut state = self.state.lock();
			if state.closed {
				return;
			}
			state.closed = true;
			std::mem::take(&mut state.sessions)
		};

		let calls = self.calls.lock().drain();
		tracing::debug!(
			url = %self.url,
			pending = calls.len(),
			sessions = sessions.len(),
			"Closing connection"
		);

		let target = self.describe();
		for call in calls {
			let method = call.method().to_string();
			call.reject(Error::TargetClosed {
				method,
				target: target.clone(),
			});
		}

		for session in sessions.into_values() {
			session.on_close();
		}

		self.events.emit(DISCONNECTED, &Notification::Disconnected);
	}

	fn describe(&self) -> String {
		format!("connection {}", self.url)
	}

	fn closed_error(&self, method: &str) -> Error {
		Error::TargetClosed {
			method: method.to_string(),
			target: self.describe(),
		}
	}
}

impl std::fmt::Debug for Connection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("Connection")
			.field("url", &self.url)
			.field("last_id", &self.last_id.load(Ordering::SeqCst))
			.field("sessions", &state.sessions.len())
			.field("closed", &state.closed)
			.finish()
	}
}

fn parse_params<T: DeserializeOwned>(envelope: &Envelope, method: &str) -> Result<T> {
	let params = envelope
		.params
		.clone()
		.ok_or_else(|| Error::InvalidMessage(format!("{method} missing params")))?;
	serde_json::from_value(params).map_err(|e| Error::InvalidMessage(format!("{method}: {e}")))
}
