//! Wire types for the multiplexed DevTools protocol.
//!
//! This crate contains the serde-serializable shapes exchanged with a remote
//! automation target over a single transport. Every message on the wire is an
//! [`Envelope`]: a request, a response, or a bare event, optionally scoped to a
//! sub-session by its `sessionId`.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **Structural only**: The two attach/detach notifications are the only
//!   command schemas modelled here; everything else travels as opaque JSON
//! - **Stable**: Changes only when the wire protocol changes
//!
//! Request correlation and session routing are built on top of these types in
//! `cdp-runtime`.

pub mod envelope;
pub mod methods;
pub mod target;

pub use envelope::*;
pub use methods::*;
pub use target::*;
