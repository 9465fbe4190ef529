//! Error types for the session runtime.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a remote target.
#[derive(Debug, Error)]
pub enum Error {
	/// The remote side answered a request with a structured error.
	#[error("Protocol error ({method}): {message}{}", format_data(data))]
	Protocol {
		/// Method of the request that failed.
		method: String,
		/// Server-provided message.
		message: String,
		/// Server-provided error code.
		code: i64,
		/// Optional structured detail.
		data: Option<Value>,
	},

	/// A call was outstanding on, or issued against, a connection or session
	/// that has closed.
	#[error("Protocol error ({method}): Target closed ({target})")]
	TargetClosed {
		/// Method of the affected call.
		method: String,
		/// Which target closed, e.g. `connection ws://…` or `session S1 (page)`.
		target: String,
	},

	/// A send or detach was attempted on a session that is already detached.
	#[error(
		"Protocol error ({method}): Session closed. Most likely the {target_type} has been closed."
	)]
	SessionClosed {
		method: String,
		session_id: String,
		target_type: String,
	},

	/// Attach succeeded but no session was registered under the returned id.
	///
	/// This means the attach notification did not arrive before the attach
	/// response, which the protocol guarantees; it is never retried.
	#[error("Session creation failed: no session registered for id {session_id}")]
	SessionCreation { session_id: String },

	/// Failed to establish the transport.
	#[error("Failed to connect to {url}: {reason}")]
	ConnectionFailed { url: String, reason: String },

	/// Transport-level failure while reading or writing.
	#[error("Transport error: {0}")]
	Transport(String),

	/// A structurally reserved message was missing required fields.
	#[error("Invalid message: {0}")]
	InvalidMessage(String),

	/// The completion handle of a call was dropped without being settled.
	#[error("Response channel closed unexpectedly")]
	ChannelClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

fn format_data(data: &Option<Value>) -> String {
	match data {
		None | Some(Value::Null) => String::new(),
		Some(Value::String(s)) => format!(" {s}"),
		Some(other) => format!(" {other}"),
	}
}

impl Error {
	/// Returns the method name of the call this error settled, if any.
	pub fn method(&self) -> Option<&str> {
		match self {
			Error::Protocol { method, .. }
			| Error::TargetClosed { method, .. }
			| Error::SessionClosed { method, .. } => Some(method),
			_ => None,
		}
	}

	/// Returns true if the call failed because its target went away.
	pub fn is_target_closed(&self) -> bool {
		matches!(self, Error::TargetClosed { .. } | Error::SessionClosed { .. })
	}

	/// Returns true if the remote side rejected the call.
	pub fn is_protocol(&self) -> bool {
		matches!(self, Error::Protocol { .. })
	}

	/// Returns the server-provided error code for protocol errors.
	pub fn code(&self) -> Option<i64> {
		match self {
			Error::Protocol { code, .. } => Some(*code),
			_ => None,
		}
	}
}
