//! End-to-end delivery tests
//!
//! Real hub and real connections over in-memory transports, with fake
//! collaborators behind the hub.

mod lifecycle_tests;

use std::time::Duration;

use axum::extract::ws::Message;
use futures::channel::mpsc as duplex;
use futures::StreamExt;
use tokio::task::JoinHandle;

use chat_realtime::config::Settings;
use chat_realtime::presentation::websocket::{Connection, DeliveredFrame, HubHandle};

/// The client end of an in-memory socket.
pub struct TestClient {
    to_server: duplex::UnboundedSender<Result<Message, axum::Error>>,
    from_server: duplex::UnboundedReceiver<Message>,
    pub task: JoinHandle<()>,
}

impl TestClient {
    /// Open a connection for `user_id` against `hub`.
    pub fn connect(hub: &HubHandle, user_id: i64, settings: &Settings) -> Self {
        let (to_server, stream) = duplex::unbounded();
        let (sink, from_server) = duplex::unbounded();

        let connection = Connection::new(user_id, hub.clone(), settings.websocket.clone());
        let task = tokio::spawn(connection.run(sink, stream));

        Self {
            to_server,
            from_server,
            task,
        }
    }

    pub fn send_text(&self, text: &str) {
        self.to_server
            .unbounded_send(Ok(Message::Text(text.to_owned().into())))
            .unwrap();
    }

    pub fn send_chat(&self, user_id: i64, chat_id: i64, message: &str) {
        let frame = serde_json::json!({
            "user_id": user_id,
            "chat_type": "private",
            "chat_id": chat_id,
            "message": message,
        });
        self.send_text(&frame.to_string());
    }

    pub fn close(&self) {
        self.to_server.unbounded_send(Ok(Message::Close(None))).unwrap();
    }

    /// Next frame from the server, or `None` if nothing arrives in time.
    pub async fn recv(&mut self, within: Duration) -> Option<Message> {
        tokio::time::timeout(within, self.from_server.next())
            .await
            .ok()
            .flatten()
    }

    /// Next delivered chat frame; panics on anything else.
    pub async fn recv_delivery(&mut self) -> DeliveredFrame {
        match self.recv(Duration::from_secs(2)).await {
            Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a delivered frame, got {:?}", other),
        }
    }

    /// Assert no text frame arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Some(Message::Text(text)) = self.recv(window).await {
            panic!("unexpected frame: {}", text.as_str());
        }
    }
}
