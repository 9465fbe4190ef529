//! The single message shape used on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One wire message: a request, a response, or a bare event.
///
/// All fields are optional on the wire. Which of them are present decides how
/// the message is routed:
///
/// | fields              | meaning                          |
/// |---------------------|----------------------------------|
/// | `id` + `method`     | request (outbound only)          |
/// | `id` + `result`     | success response                 |
/// | `id` + `error`      | failure response                 |
/// | `method` without id | event                            |
/// | `sessionId`         | scoped to that sub-session       |
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
	/// Correlation id, present on requests and responses only.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<u64>,

	/// Sub-session this message belongs to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,

	/// Command or event name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub method: Option<String>,

	/// Command or event payload.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,

	/// Success payload of a response.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,

	/// Failure payload of a response.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

impl Envelope {
	/// Returns true if this message answers a request.
	pub fn is_response(&self) -> bool {
		self.id.is_some() && self.method.is_none()
	}

	/// Returns true if this message is a bare event.
	pub fn is_event(&self) -> bool {
		self.id.is_none() && self.method.is_some()
	}

	/// Returns the params, or `Value::Null` when absent.
	pub fn params_or_null(&self) -> Value {
		self.params.clone().unwrap_or(Value::Null)
	}
}

/// Outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	/// Unique id under the owning connection.
	pub id: u64,
	/// Method to invoke.
	pub method: String,
	/// Method parameters; omitted on the wire when null.
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
	/// Session the request is scoped to, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Structured failure returned by the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// Human-readable message.
	pub message: String,
	/// Numeric error code (JSON-RPC style).
	#[serde(default)]
	pub code: i64,
	/// Optional structured detail.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}
