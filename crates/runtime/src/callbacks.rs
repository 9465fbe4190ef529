//! Pending-call table and the future handed back to callers.
//!
//! Every request registers a [`PendingCall`] under its id. The call is taken
//! out of its table exactly once: by the router when the correlated response
//! arrives, by closure of its owner, or by the caller dropping the
//! [`ResponseFuture`] before it settles.

use std::collections::HashMap;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use cdp_protocol::ErrorPayload;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Call-site context captured when a request is issued.
#[derive(Debug, Clone)]
pub struct CallContext {
	/// Method of the request.
	pub method: String,
	/// Session the request was scoped to, if any.
	pub session_id: Option<String>,
	/// Source location of the caller.
	pub location: &'static Location<'static>,
}

/// An outstanding request awaiting its response.
#[derive(Debug)]
pub struct PendingCall {
	id: u64,
	context: CallContext,
	tx: oneshot::Sender<Result<Value>>,
}

impl PendingCall {
	pub fn new(id: u64, context: CallContext) -> (Self, oneshot::Receiver<Result<Value>>) {
		let (tx, rx) = oneshot::channel();
		(Self { id, context, tx }, rx)
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn method(&self) -> &str {
		&self.context.method
	}

	/// Settles from a response's `result` / `error` fields.
	pub fn settle(self, result: Option<Value>, error: Option<ErrorPayload>) {
		let outcome = match error {
			Some(error) => Err(Error::Protocol {
				method: self.context.method.clone(),
				message: error.message,
				code: error.code,
				data: error.data,
			}),
			None => Ok(result.unwrap_or(Value::Null)),
		};
		self.complete(outcome);
	}

	/// Rejects the call with `error`.
	pub fn reject(self, error: Error) {
		tracing::debug!(
			id = self.id,
			method = %self.context.method,
			session_id = self.context.session_id.as_deref(),
			caller = %self.context.location,
			error = %error,
			"Rejecting pending call"
		);
		self.complete(Err(error));
	}

	fn complete(self, outcome: Result<Value>) {
		if self.tx.send(outcome).is_err() {
			tracing::debug!(id = self.id, "Caller dropped the response future before settlement");
		}
	}
}

/// Pending calls of one owner (a connection or a session), keyed by id.
#[derive(Debug, Default)]
pub struct CallbackTable {
	calls: HashMap<u64, PendingCall>,
}

impl CallbackTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, call: PendingCall) {
		let previous = self.calls.insert(call.id, call);
		debug_assert!(previous.is_none(), "request id registered twice");
	}

	/// Removes and returns the call registered under `id`.
	pub fn take(&mut self, id: u64) -> Option<PendingCall> {
		self.calls.remove(&id)
	}

	/// Removes every call, in id order.
	pub fn drain(&mut self) -> Vec<PendingCall> {
		let mut calls: Vec<_> = self.calls.drain().map(|(_, call)| call).collect();
		calls.sort_by_key(PendingCall::id);
		calls
	}

	pub fn contains(&self, id: u64) -> bool {
		self.calls.contains_key(&id)
	}

	pub fn len(&self) -> usize {
		self.calls.len()
	}

	pub fn is_empty(&self) -> bool {
		self.calls.is_empty()
	}

	/// Ids of every outstanding call, ascending.
	pub fn ids(&self) -> Vec<u64> {
		let mut ids: Vec<_> = self.calls.keys().copied().collect();
		ids.sort_unstable();
		ids
	}
}

/// Removes an orphaned entry when a [`ResponseFuture`] is dropped unsettled.
pub(crate) struct CancelGuard {
	id: u64,
	forget: Option<Box<dyn FnOnce(u64) + Send>>,
}

impl CancelGuard {
	pub(crate) fn new(id: u64, forget: Box<dyn FnOnce(u64) + Send>) -> Self {
		Self {
			id,
			forget: Some(forget),
		}
	}

	/// Guard over a table shared behind `Arc<Mutex<_>>`.
	pub(crate) fn for_table<T, F>(id: u64, table: &Arc<Mutex<T>>, take: F) -> Self
	where
		T: Send + 'static,
		F: FnOnce(&mut T, u64) -> Option<PendingCall> + Send + 'static,
	{
		let weak = Arc::downgrade(table);
		Self::new(
			id,
			Box::new(move |id| {
				if let Some(table) = weak.upgrade() {
					let mut table = table.lock();
					if take(&mut *table, id).is_some() {
						tracing::debug!(id, "CancelGuard: removed orphaned callback");
					}
				}
			}),
		)
	}

	fn complete(&mut self) {
		self.forget = None;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if let Some(forget) = self.forget.take() {
			forget(self.id);
		}
	}
}

enum State {
	Ready(Option<Error>),
	Pending {
		rx: oneshot::Receiver<Result<Value>>,
		guard: CancelGuard,
	},
}

/// Future returned by `send`, settling exactly once with the call's outcome.
///
/// A send that cannot be issued (owner closed or detached) yields a future
/// that is already settled with the error; nothing reaches the transport.
#[must_use = "a ResponseFuture does nothing unless awaited"]
pub struct ResponseFuture {
	id: Option<u64>,
	state: State,
}

impl ResponseFuture {
	pub(crate) fn pending(id: u64, rx: oneshot::Receiver<Result<Value>>, guard: CancelGuard) -> Self {
		Self {
			id: Some(id),
			state: State::Pending { rx, guard },
		}
	}

	pub(crate) fn failed(error: Error) -> Self {
		Self {
			id: None,
			state: State::Ready(Some(error)),
		}
	}

	/// Id assigned to the request, or `None` if it was never sent.
	pub fn id(&self) -> Option<u64> {
		self.id
	}
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match &mut self.state {
			State::Ready(error) => match error.take() {
				Some(error) => Poll::Ready(Err(error)),
				None => panic!("ResponseFuture polled after completion"),
			},
			State::Pending { rx, guard } => match Pin::new(rx).poll(cx) {
				Poll::Ready(result) => {
					guard.complete();
					Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
				}
				Poll::Pending => Poll::Pending,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn context(method: &str) -> CallContext {
		CallContext {
			method: method.to_string(),
			session_id: None,
			location: Location::caller(),
		}
	}

	#[tokio::test]
	async fn test_settle_success() {
		let (call, rx) = PendingCall::new(7, context("Page.navigate"));
		call.settle(Some(json!({"x": 1})), None);
		assert_eq!(rx.await.unwrap().unwrap(), json!({"x": 1}));
	}

	#[tokio::test]
	async fn test_settle_without_result_is_null() {
		let (call, rx) = PendingCall::new(1, context("Page.enable"));
		call.settle(None, None);
		assert_eq!(rx.await.unwrap().unwrap(), Value::Null);
	}

	#[tokio::test]
	async fn test_settle_error_embeds_method() {
		let (call, rx) = PendingCall::new(9, context("Foo.bar"));
		call.settle(
			None,
			Some(ErrorPayload {
				message: "boom".to_string(),
				code: -1,
				data: None,
			}),
		);
		let err = rx.await.unwrap().unwrap_err();
		let text = err.to_string();
		assert!(text.contains("Foo.bar"), "{text}");
		assert!(text.contains("boom"), "{text}");
	}

	#[test]
	fn test_table_take_is_single_shot() {
		let mut table = CallbackTable::new();
		let (call, _rx) = PendingCall::new(3, context("A.b"));
		table.insert(call);

		assert!(table.contains(3));
		assert!(table.take(3).is_some());
		assert!(table.take(3).is_none());
		assert!(table.is_empty());
	}

	#[test]
	fn test_table_drain_in_id_order() {
		let mut table = CallbackTable::new();
		let mut receivers = Vec::new();
		for id in [5, 2, 9] {
			let (call, rx) = PendingCall::new(id, context("A.b"));
			table.insert(call);
			receivers.push(rx);
		}

		assert_eq!(table.ids(), vec![2, 5, 9]);
		let drained: Vec<u64> = table.drain().iter().map(PendingCall::id).collect();
		assert_eq!(drained, vec![2, 5, 9]);
		assert_eq!(table.len(), 0);
	}

	#[tokio::test]
	async fn test_failed_future_is_ready() {
		let fut = ResponseFuture::failed(Error::ChannelClosed);
		assert_eq!(fut.id(), None);
		assert!(matches!(fut.await, Err(Error::ChannelClosed)));
	}

	#[tokio::test]
	async fn test_dropped_future_removes_entry() {
		let table = Arc::new(Mutex::new(CallbackTable::new()));
		let (call, rx) = PendingCall::new(4, context("A.b"));
		table.lock().insert(call);

		let guard = CancelGuard::for_table(4, &table, CallbackTable::take);
		let fut = ResponseFuture::pending(4, rx, guard);
		assert_eq!(fut.id(), Some(4));
		drop(fut);

		assert!(table.lock().is_empty());
	}

	#[tokio::test]
	async fn test_settled_future_does_not_touch_table() {
		let table = Arc::new(Mutex::new(CallbackTable::new()));
		let (call, rx) = PendingCall::new(4, context("A.b"));
		let guard = CancelGuard::for_table(4, &table, CallbackTable::take);
		let fut = ResponseFuture::pending(4, rx, guard);

		call.settle(Some(json!(true)), None);
		assert_eq!(fut.await.unwrap(), json!(true));

		let (other, _rx) = PendingCall::new(4, context("A.b"));
		table.lock().insert(other);
		assert!(table.lock().contains(4));
	}
}
