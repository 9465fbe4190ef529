//! Target descriptors and the params of the structural attach/detach messages.

use serde::{Deserialize, Serialize};

/// Description of a remote target (tab, worker, iframe, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	/// Remote target id.
	pub target_id: String,
	/// Target kind, e.g. `"page"`, `"iframe"`, `"service_worker"`.
	#[serde(rename = "type")]
	pub target_type: String,
	/// Document title, when known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// Current URL, when known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	/// Whether some client is attached already.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attached: Option<bool>,
}

impl TargetInfo {
	/// Creates a descriptor with only the required fields set.
	pub fn new(target_id: impl Into<String>, target_type: impl Into<String>) -> Self {
		Self {
			target_id: target_id.into(),
			target_type: target_type.into(),
			title: None,
			url: None,
			attached: None,
		}
	}
}

/// Params of `Target.attachedToTarget`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedToTarget {
	/// Id of the newly created session.
	pub session_id: String,
	/// Target the session is bound to.
	pub target_info: TargetInfo,
	/// Whether the target is paused waiting for a debugger.
	#[serde(default)]
	pub waiting_for_debugger: bool,
}

/// Params of `Target.detachedFromTarget`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedFromTarget {
	/// Id of the session being torn down.
	pub session_id: String,
	/// Target the session was bound to (deprecated upstream, optional).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_id: Option<String>,
}

/// Params of the `Target.attachToTarget` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTarget {
	pub target_id: String,
	/// Flat mode: the session's traffic is multiplexed by `sessionId`.
	pub flatten: bool,
}

/// Result of the `Target.attachToTarget` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
	pub session_id: String,
}

/// Params of the `Target.detachFromTarget` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachFromTarget {
	pub session_id: String,
}
