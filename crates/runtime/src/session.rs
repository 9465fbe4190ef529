//! Flat session multiplexed over a [`Connection`].
//!
//! A session is created by the connection when a `Target.attachedToTarget`
//! notification arrives and lives in the connection's session map until the
//! matching `Target.detachedFromTarget` (or connection closure) is routed.
//! It keeps only a weak reference back to its connection; once that reference
//! is cleared the session is permanently detached.

use std::future::Future;
use std::panic::Location;
use std::sync::{Arc, Weak};

use cdp_protocol::{DETACH_FROM_TARGET, DetachFromTarget, Envelope, TargetInfo};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::callbacks::{CallContext, CallbackTable, CancelGuard, PendingCall, ResponseFuture};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::events::{DISCONNECTED, EventEmitter, Notification, Subscription};

struct SessionInner {
	/// `None` once detached.
	connection: Option<Weak<Connection>>,
	calls: CallbackTable,
}

/// A logical channel to one remote target.
pub struct Session {
	id: String,
	target_type: String,
	target_id: String,
	inner: Arc<Mutex<SessionInner>>,
	events: EventEmitter<Notification>,
}

impl Session {
	pub(crate) fn new(id: String, target: &TargetInfo, connection: Weak<Connection>) -> Self {
		Self {
			id,
			target_type: target.target_type.clone(),
			target_id: target.target_id.clone(),
			inner: Arc::new(Mutex::new(SessionInner {
				connection: Some(connection),
				calls: CallbackTable::new(),
			})),
			events: EventEmitter::new(),
		}
	}

	/// Session id assigned by the remote side.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Kind of the attached target, e.g. `"page"`.
	pub fn target_type(&self) -> &str {
		&self.target_type
	}

	pub fn target_id(&self) -> &str {
		&self.target_id
	}

	/// Owning connection, or `None` once detached.
	pub fn connection(&self) -> Option<Arc<Connection>> {
		self.inner.lock().connection.as_ref().and_then(Weak::upgrade)
	}

	pub fn is_detached(&self) -> bool {
		self.inner.lock().connection.is_none()
	}

	/// Number of calls awaiting a response on this session.
	pub fn pending_count(&self) -> usize {
		self.inner.lock().calls.len()
	}

	/// Sends a command scoped to this session.
	///
	/// A detached session returns a future already settled with
	/// [`Error::SessionClosed`]; the transport is not touched.
	#[track_caller]
	pub fn send(&self, method: &str, params: Value) -> ResponseFuture {
		let location = Location::caller();

		let mut inner = self.inner.lock();
		let Some(connection) = inner.connection.as_ref().and_then(Weak::upgrade) else {
			tracing::debug!(session_id = %self.id, method, "Send on detached session");
			return ResponseFuture::failed(self.closed_error(method));
		};

		let id = match connection.raw_send(method, params, Some(&self.id)) {
			Ok(id) => id,
			Err(e) => return ResponseFuture::failed(e),
		};
		let (call, rx) = PendingCall::new(
			id,
			CallContext {
				method: method.to_string(),
				session_id: Some(self.id.clone()),
				location,
			},
		);
		inner.calls.insert(call);
		drop(inner);

		let guard = CancelGuard::for_table(id, &self.inner, |inner: &mut SessionInner, id| {
			inner.calls.take(id)
		});
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

	/// Asks the remote side to detach this session.
	///
	/// Local teardown happens only when the resulting
	/// `Target.detachedFromTarget` notification is routed back.
	pub async fn detach(&self) -> Result<()> {
		let connection = self
			.connection()
			.ok_or_else(|| self.closed_error(DETACH_FROM_TARGET))?;

		let params = DetachFromTarget {
			session_id: self.id.clone(),
		};
		let _: Value = connection.send_as(DETACH_FROM_TARGET, params).await?;
		Ok(())
	}

	/// Registers `listener` for `name` on this session.
	pub fn on<F>(&self, name: impl Into<String>, listener: F) -> Subscription
	where
		F: Fn(&Notification) + Send + Sync + 'static,
	{
		self.events.on(name, listener)
	}

	pub(crate) fn emit(&self, name: &str, notification: &Notification) -> bool {
		self.events.emit(name, notification)
	}

	/// Routes a message scoped to this session.
	pub(crate) fn on_message(&self, envelope: Envelope) {
		if let Some(id) = envelope.id {
			let call = self.inner.lock().calls.take(id);
			match call {
				Some(call) => {
					tracing::debug!(session_id = %self.id, id, method = call.method(), "Settling response");
					call.settle(envelope.result, envelope.error);
				}
				None => tracing::warn!(
					session_id = %self.id,
					id,
					"Response for unknown request id (ignored)"
				),
			}
		} else if let Some(method) = envelope.method {
			let notification = Notification::Protocol {
				method: method.clone(),
				params: envelope.params.unwrap_or(Value::Null),
			};
			self.events.emit(&method, &notification);
		}
	}

	/// Detaches locally. Idempotent.
	///
	/// Rejects every pending call, clears the connection reference and emits
	/// [`DISCONNECTED`].
	pub(crate) fn on_close(&self) {
		let calls = {
			let mut inner = self.inner.lock();
			if inner.connection.take().is_none() {
				return;
			}
			inner.calls.drain()
		};

		tracing::debug!(session_id = %self.id, pending = calls.len(), "Closing session");

		let target = format!("session {} ({})", self.id, self.target_type);
		for call in calls {
			let method = call.method().to_string();
			call.reject(Error::TargetClosed {
				method,
				target: target.clone(),
			});
		}

		self.events.emit(DISCONNECTED, &Notification::Disconnected);
	}

	fn closed_error(&self, method: &str) -> Error {
		Error::SessionClosed {
			method: method.to_string(),
			session_id: self.id.clone(),
			target_type: self.target_type.clone(),
		}
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("target_type", &self.target_type)
			.field("target_id", &self.target_id)
			.field("detached", &self.is_detached())
			.finish()
	}
}
