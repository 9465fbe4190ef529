//! Transport abstraction for the raw message channel.
//!
//! A transport is split into a sending half ([`Transport`]) and a receiving
//! half ([`TransportReceiver`]). The receiver forwards every inbound text
//! message into an unbounded channel; when it returns, the channel closes and
//! the connection observes the termination exactly once.
//!
//! Implementations:
//! - [`WebSocketTransport`]: text frames over `ws://` / `wss://`
//! - [`PipeTransport`]: NUL-terminated JSON over any async byte stream pair
//! - [`FakeTransportBuilder`]: in-memory transport for tests

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::error::Result;

mod fake;
mod pipe;
mod websocket;

pub use fake::{FakeTransportBuilder, FakeTransportController};
pub use pipe::{PipeTransport, PipeTransportReceiver, PipeTransportSender};
pub use websocket::{WebSocketTransport, WebSocketTransportReceiver, WebSocketTransportSender};

/// Sending half of a transport.
pub trait Transport: Send {
	/// Sends one fully serialized message.
	fn send(&mut self, message: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

	/// Closes the channel. The paired receiver terminates afterwards.
	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Receiving half of a transport.
pub trait TransportReceiver: Send {
	/// Reads until the channel terminates, forwarding each message.
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves of a transport plus the channel inbound messages arrive on.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<String>,
}

#[cfg(test)]
mod tests;
