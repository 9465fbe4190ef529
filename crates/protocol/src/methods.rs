//! Method names reserved by the session layer.
//!
//! Every other method is opaque and only routed, never interpreted.

/// Notification announcing that a new flat session now exists.
pub const ATTACHED_TO_TARGET: &str = "Target.attachedToTarget";

/// Notification announcing that a session has been torn down remotely.
pub const DETACHED_FROM_TARGET: &str = "Target.detachedFromTarget";

/// Command that attaches to a target and yields a new session id.
pub const ATTACH_TO_TARGET: &str = "Target.attachToTarget";

/// Command that detaches a session from its target.
pub const DETACH_FROM_TARGET: &str = "Target.detachFromTarget";

/// Returns true for the two notifications that create or destroy sessions.
pub fn is_structural(method: &str) -> bool {
	method == ATTACHED_TO_TARGET || method == DETACHED_FROM_TARGET
}
