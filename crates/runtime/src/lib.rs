//! DevTools Runtime - Transport, request correlation, and flat sessions
//!
//! This crate provides the protocol layer that lets many logical command and
//! event channels share one transport to a remote automation target:
//!
//! - **Transport**: Bidirectional text messages over WebSocket or pipes
//! - **Connection**: Request/response correlation with one shared id space
//! - **Session**: Per-target channels materialized from attach notifications
//! - **Events**: Named publish/subscribe fan-out on connections and sessions
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  caller layers   │  Pages, frames, targets (not in this crate)
//! └────────┬─────────┘
//!          │ send / on
//! ┌────────▼─────────┐
//! │   cdp-runtime    │  This crate
//! │  ┌────────────┐  │
//! │  │ Session *  │  │  Flat sessions, own pending calls
//! │  └─────┬──────┘  │
//! │  ┌─────▼──────┐  │
//! │  │ Connection │  │  Id counter, router, closure
//! │  └─────┬──────┘  │
//! │  ┌─────▼──────┐  │
//! │  │ Transport  │  │  WebSocket / pipe / fake
//! │  └────────────┘  │
//! └──────────────────┘
//! ```
//!
//! # Settlement guarantee
//!
//! Every call issued through [`Connection::send`] or [`Session::send`]
//! settles exactly once: with the correlated response, or with
//! [`Error::TargetClosed`] when its owner closes. There are no timeouts or
//! retries at this layer.

pub mod callbacks;
pub mod connection;
pub mod error;
pub mod events;
pub mod options;
pub mod session;
pub mod transport;

pub use callbacks::{CallContext, CallbackTable, PendingCall, ResponseFuture};
pub use connection::Connection;
pub use error::{Error, Result};
pub use events::{
	DISCONNECTED, EventEmitter, HandlerId, Notification, SESSION_ATTACHED, SESSION_DETACHED,
	Subscription,
};
pub use options::ConnectionOptions;
pub use session::Session;
pub use transport::{
	FakeTransportBuilder, FakeTransportController, PipeTransport, PipeTransportReceiver,
	PipeTransportSender, Transport, TransportParts, TransportReceiver, WebSocketTransport,
	WebSocketTransportReceiver, WebSocketTransportSender,
};

pub use cdp_protocol as protocol;
