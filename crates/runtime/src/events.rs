//! Named publish/subscribe fan-out used by connections and sessions.
//!
//! Listeners are stored per event name in an [`IndexMap`] keyed by
//! [`HandlerId`], giving O(1) removal and stable registration order.
//! [`EventEmitter::emit`] snapshots the listeners for a name and calls them
//! synchronously, in order, with no lock held; a listener removed while a
//! dispatch is running still sees that dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::session::Session;

/// Emitted when a session is attached. Payload: [`Notification::SessionAttached`].
pub const SESSION_ATTACHED: &str = "sessionattached";

/// Emitted when a session is detached. Payload: [`Notification::SessionDetached`].
pub const SESSION_DETACHED: &str = "sessiondetached";

/// Emitted once when a connection or session closes. Payload: [`Notification::Disconnected`].
pub const DISCONNECTED: &str = "disconnected";

/// Unique identifier for listeners.
pub type HandlerId = u64;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a new globally-unique handler ID.
pub fn next_handler_id() -> HandlerId {
	NEXT_HANDLER_ID.fetch_add(1, Ordering::SeqCst)
}

/// Payload delivered to listeners of connections and sessions.
#[derive(Clone)]
pub enum Notification {
	/// A new session exists.
	SessionAttached(Arc<Session>),
	/// A session has been torn down.
	SessionDetached(Arc<Session>),
	/// The emitter's owner closed.
	Disconnected,
	/// Any other protocol event, by method name.
	Protocol { method: String, params: Value },
}

impl fmt::Debug for Notification {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Notification::SessionAttached(session) => {
				f.debug_tuple("SessionAttached").field(&session.id()).finish()
			}
			Notification::SessionDetached(session) => {
				f.debug_tuple("SessionDetached").field(&session.id()).finish()
			}
			Notification::Disconnected => f.write_str("Disconnected"),
			Notification::Protocol { method, params } => f
				.debug_struct("Protocol")
				.field("method", method)
				.field("params", params)
				.finish(),
		}
	}
}

impl Notification {
	/// Returns the session carried by attach/detach notifications.
	pub fn session(&self) -> Option<&Arc<Session>> {
		match self {
			Notification::SessionAttached(session) | Notification::SessionDetached(session) => {
				Some(session)
			}
			_ => None,
		}
	}

	/// Returns the params of a protocol event.
	pub fn params(&self) -> Option<&Value> {
		match self {
			Notification::Protocol { params, .. } => Some(params),
			_ => None,
		}
	}
}

/// Listener function.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

type ListenerMap<E> = HashMap<String, IndexMap<HandlerId, Listener<E>>>;

/// Registry mapping event names to ordered listeners.
pub struct EventEmitter<E> {
	listeners: Arc<Mutex<ListenerMap<E>>>,
}

impl<E> Default for EventEmitter<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E> EventEmitter<E> {
	pub fn new() -> Self {
		Self {
			listeners: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Number of listeners registered for `name`.
	pub fn listener_count(&self, name: &str) -> usize {
		self.listeners.lock().get(name).map_or(0, IndexMap::len)
	}
}

impl<E: 'static> EventEmitter<E> {
	/// Registers `listener` for `name`.
	///
	/// The listener stays registered for as long as the returned
	/// [`Subscription`] is alive.
	pub fn on<F>(&self, name: impl Into<String>, listener: F) -> Subscription
	where
		F: Fn(&E) + Send + Sync + 'static,
	{
		let name = name.into();
		let id = next_handler_id();
		self.listeners
			.lock()
			.entry(name.clone())
			.or_default()
			.insert(id, Arc::new(listener));

		let weak: Weak<Mutex<ListenerMap<E>>> = Arc::downgrade(&self.listeners);
		let dropper = Arc::new(move |id: HandlerId| {
			if let Some(map) = weak.upgrade() {
				let mut map = map.lock();
				if let Some(entries) = map.get_mut(&name) {
					entries.shift_remove(&id);
					if entries.is_empty() {
						map.remove(&name);
					}
				}
			}
		});
		Subscription::new(id, dropper)
	}

	/// Calls every listener registered for `name`, in registration order.
	///
	/// Returns true if at least one listener was called.
	pub fn emit(&self, name: &str, event: &E) -> bool {
		let snapshot: Vec<Listener<E>> = match self.listeners.lock().get(name) {
			Some(entries) => entries.values().cloned().collect(),
			None => return false,
		};

		for listener in &snapshot {
			listener(event);
		}
		!snapshot.is_empty()
	}
}

/// RAII handle that unregisters a listener on drop.
///
/// Holds a weak reference to the registry, so dropping it after the owning
/// connection or session is gone is a no-op.
pub struct Subscription {
	id: HandlerId,
	dropper: Option<Arc<dyn Fn(HandlerId) + Send + Sync>>,
}

impl Subscription {
	/// Creates a subscription with a custom dropper function.
	pub fn new(id: HandlerId, dropper: Arc<dyn Fn(HandlerId) + Send + Sync>) -> Self {
		Self {
			id,
			dropper: Some(dropper),
		}
	}

	/// Returns this subscription's handler ID.
	pub fn id(&self) -> HandlerId {
		self.id
	}

	/// Explicitly unsubscribes. Equivalent to dropping.
	pub fn unsubscribe(mut self) {
		if let Some(dropper) = self.dropper.take() {
			(dropper)(self.id);
		}
	}

	/// Keeps the listener registered for the lifetime of its emitter.
	pub fn forget(mut self) {
		self.dropper = None;
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(dropper) = self.dropper.take() {
			(dropper)(self.id);
		}
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("active", &self.dropper.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_handler_id_increments() {
		let id1 = next_handler_id();
		let id2 = next_handler_id();
		assert!(id2 > id1);
	}

	#[test]
	fn test_emit_in_registration_order() {
		let emitter: EventEmitter<u32> = EventEmitter::new();
		let seen = Arc::new(Mutex::new(Vec::new()));

		let a = {
			let seen = Arc::clone(&seen);
			emitter.on("tick", move |n: &u32| seen.lock().push(("a", *n)))
		};
		let b = {
			let seen = Arc::clone(&seen);
			emitter.on("tick", move |n: &u32| seen.lock().push(("b", *n)))
		};

		assert!(emitter.emit("tick", &7));
		assert_eq!(*seen.lock(), vec![("a", 7), ("b", 7)]);
		drop((a, b));
	}

	#[test]
	fn test_emit_without_listeners() {
		let emitter: EventEmitter<u32> = EventEmitter::new();
		assert!(!emitter.emit("nothing", &1));
	}

	#[test]
	fn test_listeners_are_scoped_by_name() {
		let emitter: EventEmitter<u32> = EventEmitter::new();
		let hits = Arc::new(AtomicU64::new(0));

		let _sub = {
			let hits = Arc::clone(&hits);
			emitter.on("a", move |_: &u32| {
				hits.fetch_add(1, Ordering::SeqCst);
			})
		};

		emitter.emit("b", &1);
		assert_eq!(hits.load(Ordering::SeqCst), 0);
		emitter.emit("a", &1);
		assert_eq!(hits.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_subscription_drop_unsubscribes() {
		let emitter: EventEmitter<u32> = EventEmitter::new();
		{
			let _sub = emitter.on("tick", |_: &u32| {});
			assert_eq!(emitter.listener_count("tick"), 1);
		}
		assert_eq!(emitter.listener_count("tick"), 0);
	}

	#[test]
	fn test_subscription_forget_keeps_listener() {
		let emitter: EventEmitter<u32> = EventEmitter::new();
		emitter.on("tick", |_: &u32| {}).forget();
		assert_eq!(emitter.listener_count("tick"), 1);
	}

	#[test]
	fn test_unsubscribe_during_dispatch_does_not_skip_snapshot() {
		let emitter: EventEmitter<u32> = EventEmitter::new();
		let hits = Arc::new(AtomicU64::new(0));
		let second: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

		let _first = {
			let second = Arc::clone(&second);
			emitter.on("tick", move |_: &u32| {
				second.lock().take();
			})
		};
		{
			let hits = Arc::clone(&hits);
			*second.lock() = Some(emitter.on("tick", move |_: &u32| {
				hits.fetch_add(1, Ordering::SeqCst);
			}));
		}

		emitter.emit("tick", &1);
		assert_eq!(hits.load(Ordering::SeqCst), 1);

		emitter.emit("tick", &2);
		assert_eq!(hits.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_subscription_outlives_emitter() {
		let emitter: EventEmitter<u32> = EventEmitter::new();
		let sub = emitter.on("tick", |_: &u32| {});
		drop(emitter);
		drop(sub);
	}
}
