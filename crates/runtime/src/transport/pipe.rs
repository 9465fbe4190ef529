//! Pipe transport: NUL-terminated JSON messages over a byte stream pair.
//!
//! This is the framing browsers use for `--remote-debugging-pipe`, where the
//! client writes to one file descriptor and reads from another.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

const DELIMITER: u8 = 0;

/// Pipe transport over a writer (to the browser) and a reader (from the browser).
pub struct PipeTransport<W, R> {
	sender: PipeTransportSender<W>,
	receiver: PipeTransportReceiver<R>,
}

impl<W, R> PipeTransport<W, R>
where
	W: AsyncWrite + Unpin + Send + 'static,
	R: AsyncRead + Unpin + Send + 'static,
{
	/// Creates a transport writing to `writer` and reading from `reader`.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<String>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let transport = Self {
			sender: PipeTransportSender { writer },
			receiver: PipeTransportReceiver {
				reader: BufReader::new(reader),
				message_tx,
			},
		};
		(transport, message_rx)
	}

	/// Splits into sender and receiver halves.
	pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
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

/// Sending half of [`PipeTransport`].
pub struct PipeTransportSender<W> {
	writer: W,
}

impl<W: AsyncWrite + Unpin + Send + 'static> Transport for PipeTransportSender<W> {
	fn send(&mut self, message: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let mut frame = message.into_bytes();
			frame.push(DELIMITER);
			self.writer
				.write_all(&frame)
				.await
				.map_err(|e| Error::Transport(format!("Failed to write message: {e}")))?;
			self.writer
				.flush()
				.await
				.map_err(|e| Error::Transport(format!("Failed to flush pipe: {e}")))
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move { self.writer.shutdown().await.map_err(Error::from) })
	}
}

/// Receiving half of [`PipeTransport`].
pub struct PipeTransportReceiver<R> {
	reader: BufReader<R>,
	message_tx: mpsc::UnboundedSender<String>,
}

impl<R: AsyncRead + Unpin + Send + 'static> PipeTransportReceiver<R> {
	async fn read_loop(&mut self) -> Result<()> {
		let mut buf = Vec::new();
		loop {
			buf.clear();
			let read = self
				.reader
				.read_until(DELIMITER, &mut buf)
				.await
				.map_err(|e| Error::Transport(format!("Failed to read from pipe: {e}")))?;

			if read == 0 {
				return Ok(());
			}
			if buf.last() != Some(&DELIMITER) {
				return Err(Error::Transport(format!(
					"Pipe closed with {} bytes of an unterminated message",
					buf.len()
				)));
			}
			buf.pop();

			let text = match String::from_utf8(std::mem::take(&mut buf)) {
				Ok(text) => text,
				Err(e) => {
					tracing::error!("Skipping pipe message that is not valid UTF-8: {}", e);
					continue;
				}
			};

			if self.message_tx.send(text).is_err() {
				return Ok(());
			}
		}
	}
}

impl<R: AsyncRead + Unpin + Send + 'static> TransportReceiver for PipeTransportReceiver<R> {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move { self.read_loop().await })
	}
}
