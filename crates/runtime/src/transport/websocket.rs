//! WebSocket transport: one protocol message per text frame.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to a DevTools endpoint, not yet split.
pub struct WebSocketTransport {
	sender: WebSocketTransportSender,
	receiver: WebSocketTransportReceiver,
}

impl WebSocketTransport {
	/// Connects to a `ws://` or `wss://` endpoint.
	///
	/// Returns the transport and the channel inbound messages will arrive on
	/// once the receiver half is running.
	pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<String>)> {
		tracing::debug!(url, "Connecting WebSocket transport");

		let (ws, _response) = connect_async(url)
			.await
			.map_err(|e| Error::ConnectionFailed {
				url: url.to_string(),
				reason: e.to_string(),
			})?;

		let (sink, stream) = ws.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		let transport = Self {
			sender: WebSocketTransportSender { sink },
			receiver: WebSocketTransportReceiver { stream, message_tx },
		};
		Ok((transport, message_rx))
	}

	/// Splits into sender and receiver halves.
	pub fn into_parts(self) -> (WebSocketTransportSender, WebSocketTransportReceiver) {
		(self.sender, self.receiver)
	}

	/// Bundles both halves with the inbound channel for a connection.
	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<String>) -> TransportParts {
		TransportParts {
			sender: Box::new(self.sender),
			receiver: Box::new(self.receiver),
			message_rx,
		}
	}
}

/// Sending half of [`WebSocketTransport`].
pub struct WebSocketTransportSender {
	sink: SplitSink<WsStream, Message>,
}

impl Transport for WebSocketTransportSender {
	fn send(&mut self, message: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.sink
				.send(Message::Text(message))
				.await
				.map_err(|e| Error::Transport(format!("WebSocket write failed: {e}")))
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			match self.sink.send(Message::Close(None)).await {
				Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {}
				Err(e) => return Err(Error::Transport(format!("WebSocket close failed: {e}"))),
			}
			match self.sink.close().await {
				Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
				Err(e) => Err(Error::Transport(format!("WebSocket close failed: {e}"))),
			}
		})
	}
}

/// Receiving half of [`WebSocketTransport`].
pub struct WebSocketTransportReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<String>,
}

impl TransportReceiver for WebSocketTransportReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(frame) = self.stream.next().await {
				let text = match frame {
					Ok(Message::Text(text)) => text.to_string(),
					Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
						Ok(text) => text,
						Err(e) => {
							tracing::error!("Skipping binary frame that is not valid UTF-8: {}", e);
							continue;
						}
					},
					Ok(Message::Close(frame)) => {
						tracing::debug!(?frame, "WebSocket closed by peer");
						break;
					}
					Ok(_) => continue,
					Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => break,
					Err(e) => return Err(Error::Transport(format!("WebSocket read failed: {e}"))),
				};

				if self.message_tx.send(text).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}
