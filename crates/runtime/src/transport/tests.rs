use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::*;

#[tokio::test]
async fn test_pipe_send_appends_nul_delimiter() {
	let (mut browser_read, client_write) = tokio::io::duplex(1024);
	let (client_read, _browser_write) = tokio::io::duplex(1024);

	let (transport, _rx) = PipeTransport::new(client_write, client_read);
	let (mut sender, _receiver) = transport.into_parts();

	sender
		.send(r#"{"id":1,"method":"Browser.getVersion"}"#.to_string())
		.await
		.unwrap();
	drop(sender);

	let mut written = Vec::new();
	browser_read.read_to_end(&mut written).await.unwrap();
	assert_eq!(written.last(), Some(&0));
	assert_eq!(&written[..written.len() - 1], br#"{"id":1,"method":"Browser.getVersion"}"#);
}

#[tokio::test]
async fn test_pipe_multiple_messages_in_one_chunk() {
	let (_browser_read, client_write) = tokio::io::duplex(4096);
	let (client_read, mut browser_write) = tokio::io::duplex(4096);

	let (transport, mut rx) = PipeTransport::new(client_write, client_read);
	let (_sender, receiver) = transport.into_parts();
	let read_task = tokio::spawn(Box::new(receiver).run());

	browser_write
		.write_all(b"{\"id\":1}\0{\"id\":2}\0{\"method\":\"Target.targetCreated\"}\0")
		.await
		.unwrap();
	browser_write.flush().await.unwrap();

	assert_eq!(rx.recv().await.unwrap(), r#"{"id":1}"#);
	assert_eq!(rx.recv().await.unwrap(), r#"{"id":2}"#);
	assert_eq!(rx.recv().await.unwrap(), r#"{"method":"Target.targetCreated"}"#);

	drop(browser_write);
	let result = read_task.await.unwrap();
	assert!(result.is_ok());
}

#[tokio::test]
async fn test_pipe_large_message() {
	let (_browser_read, client_write) = tokio::io::duplex(1024 * 1024);
	let (client_read, mut browser_write) = tokio::io::duplex(1024 * 1024);

	let (transport, mut rx) = PipeTransport::new(client_write, client_read);
	let (_sender, receiver) = transport.into_parts();
	let read_task = tokio::spawn(Box::new(receiver).run());

	let large = serde_json::json!({"id": 1, "result": {"data": "x".repeat(100_000)}}).to_string();
	browser_write.write_all(large.as_bytes()).await.unwrap();
	browser_write.write_all(&[0]).await.unwrap();
	browser_write.flush().await.unwrap();

	assert_eq!(rx.recv().await.unwrap(), large);

	drop(browser_write);
	let _ = read_task.await;
}

#[tokio::test]
async fn test_pipe_unterminated_message_is_an_error() {
	let (_browser_read, client_write) = tokio::io::duplex(1024);
	let (client_read, mut browser_write) = tokio::io::duplex(1024);

	let (transport, _rx) = PipeTransport::new(client_write, client_read);
	let (_sender, receiver) = transport.into_parts();

	browser_write.write_all(b"{\"id\":1").await.unwrap();
	browser_write.flush().await.unwrap();
	drop(browser_write);

	let result = Box::new(receiver).run().await;
	assert!(result.unwrap_err().to_string().contains("unterminated message"));
}

#[tokio::test]
async fn test_pipe_eof_is_clean_shutdown() {
	let (_browser_read, client_write) = tokio::io::duplex(1024);
	let (client_read, browser_write) = tokio::io::duplex(1024);

	let (transport, _rx) = PipeTransport::new(client_write, client_read);
	let (_sender, receiver) = transport.into_parts();
	drop(browser_write);

	assert!(Box::new(receiver).run().await.is_ok());
}

#[tokio::test]
async fn test_pipe_skips_message_that_is_not_utf8() {
	let (_browser_read, client_write) = tokio::io::duplex(1024);
	let (client_read, mut browser_write) = tokio::io::duplex(1024);

	let (transport, mut rx) = PipeTransport::new(client_write, client_read);
	let (_sender, receiver) = transport.into_parts();
	let read_task = tokio::spawn(Box::new(receiver).run());

	browser_write.write_all(b"\xff\xfe\0{\"id\":2}\0").await.unwrap();
	browser_write.flush().await.unwrap();

	assert_eq!(rx.recv().await.unwrap(), r#"{"id":2}"#);

	drop(browser_write);
	assert!(read_task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_fake_transport_records_sent_messages() {
	let (parts, controller) = FakeTransportBuilder::new().build();
	let mut sender = parts.sender;

	sender.send(r#"{"id":1,"method":"A.b"}"#.to_string()).await.unwrap();
	sender.send("not json".to_string()).await.unwrap();

	let sent = controller.wait_for_sent(2).await;
	assert_eq!(sent[0]["method"], "A.b");
	assert_eq!(sent[1], serde_json::Value::String("not json".to_string()));
	assert_eq!(controller.take_sent().len(), 2);
	assert_eq!(controller.sent_count(), 0);
}

#[tokio::test]
async fn test_fake_transport_close_terminates_receiver() {
	let (parts, controller) = FakeTransportBuilder::new().build();
	let TransportParts {
		mut sender,
		receiver,
		mut message_rx,
	} = parts;

	let read_task = tokio::spawn(receiver.run());

	controller.inject_event("Target.targetCreated", serde_json::json!({}));
	let first = message_rx.recv().await.unwrap();
	assert!(first.contains("Target.targetCreated"));

	sender.close().await.unwrap();
	assert!(controller.is_closed());
	assert!(sender.send("{}".to_string()).await.is_err());

	assert!(read_task.await.unwrap().is_ok());
	assert!(message_rx.recv().await.is_none());
}
