//! WebSocket Connection
//!
//! Bridges one client transport to the hub. Each connection runs two pumps:
//!
//! - **inbound**: reads frames from the client and publishes them to the hub
//! - **outbound**: drains the connection's mailbox onto the client, and sends
//!   keepalive pings
//!
//! The connection registers before pumping and unregisters exactly once,
//! whichever pump stops first.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use uuid::Uuid;

use super::hub::{ConnectionHandle, Frame, HubHandle, InboundFrame};
use crate::config::WebSocketSettings;

/// Why a pump stopped abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("transport read failed: {0}")]
    Read(String),

    #[error("transport write failed: {0}")]
    Write(String),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("peer silent for {0:?}")]
    Idle(Duration),

    #[error("hub is not running")]
    HubClosed,
}

/// One authenticated client connection.
pub struct Connection {
    user_id: i64,
    connection_id: Uuid,
    hub: HubHandle,
    settings: WebSocketSettings,
}

/// Which pump finished first.
enum PumpExit {
    Inbound(Result<(), ConnectionError>),
    Outbound(Result<(), ConnectionError>),
}

impl Connection {
    pub fn new(user_id: i64, hub: HubHandle, settings: WebSocketSettings) -> Self {
        Self {
            user_id,
            connection_id: Uuid::new_v4(),
            hub,
            settings,
        }
    }

    pub fn id(&self) -> Uuid {
        self.connection_id
    }

    /// Serve an upgraded WebSocket until either side gives up.
    pub async fn serve(self, socket: WebSocket) {
        let (sink, stream) = socket.split();
        self.run(sink, stream).await;
    }

    /// Register with the hub, pump frames both ways, then unregister.
    pub async fn run<W, R, E>(self, sink: W, stream: R)
    where
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display,
    {
        let (handle, mailbox) = ConnectionHandle::with_mailbox(
            self.user_id,
            self.connection_id,
            self.settings.mailbox_capacity,
        );
        let key = handle.key();

        if self.hub.register(handle).await.is_err() {
            tracing::warn!(
                user_id = self.user_id,
                connection_id = %self.connection_id,
                "Hub unavailable, dropping connection"
            );
            return;
        }

        let mut outbound = tokio::spawn(outbound_pump(sink, mailbox, self.settings.clone()));

        let exit = tokio::select! {
            result = inbound_pump(stream, &self.hub, self.user_id, self.settings.pong_timeout()) => {
                PumpExit::Inbound(result)
            }
            joined = &mut outbound => {
                PumpExit::Outbound(joined.unwrap_or_else(|e| Err(ConnectionError::Write(e.to_string()))))
            }
        };

        self.hub.unregister(key);

        match exit {
            PumpExit::Inbound(result) => {
                self.log_exit("inbound", &result);
                // Unregistering closes the mailbox, which ends the outbound pump
                // after it sends a close frame; writes are deadline-bounded.
                if let Ok(Err(e)) = outbound.await {
                    tracing::debug!(
                        user_id = self.user_id,
                        connection_id = %self.connection_id,
                        error = %e,
                        "Outbound pump ended with error"
                    );
                }
            }
            PumpExit::Outbound(result) => self.log_exit("outbound", &result),
        }
    }

    fn log_exit(&self, pump: &'static str, result: &Result<(), ConnectionError>) {
        match result {
            Ok(()) => tracing::debug!(
                user_id = self.user_id,
                connection_id = %self.connection_id,
                pump,
                "Connection closed"
            ),
            Err(e) => tracing::info!(
                user_id = self.user_id,
                connection_id = %self.connection_id,
                pump,
                error = %e,
                "Connection terminated"
            ),
        }
    }
}

/// Read client frames and hand them to the hub.
///
/// Any frame, pongs included, counts as proof of life.
async fn inbound_pump<R, E>(
    mut stream: R,
    hub: &HubHandle,
    user_id: i64,
    pong_timeout: Duration,
) -> Result<(), ConnectionError>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let next = timeout(pong_timeout, stream.next())
            .await
            .map_err(|_| ConnectionError::Idle(pong_timeout))?;

        let payload = match next {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!(user_id, "Ignoring non UTF-8 binary frame");
                    continue;
                }
            },
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ConnectionError::Read(e.to_string())),
        };

        hub.publish(InboundFrame {
            sender_id: user_id,
            payload,
        })
        .await
        .map_err(|_| ConnectionError::HubClosed)?;
    }
}

/// Drain the mailbox onto the client and keep the link alive.
///
/// Ends cleanly, after a close frame, once the hub closes the mailbox.
async fn outbound_pump<W>(
    mut sink: W,
    mut mailbox: mpsc::Receiver<Frame>,
    settings: WebSocketSettings,
) -> Result<(), ConnectionError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let write_timeout = settings.write_timeout();
    let ping_interval = settings.ping_interval();
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            frame = mailbox.recv() => match frame {
                Some(frame) => {
                    write(&mut sink, Message::Text(frame.as_ref().into()), write_timeout).await?;
                }
                None => {
                    let _ = write(&mut sink, Message::Close(None), write_timeout).await;
                    return Ok(());
                }
            },
            _ = ping.tick() => {
                write(&mut sink, Message::Ping(Default::default()), write_timeout).await?;
            }
        }
    }
}

async fn write<W>(sink: &mut W, message: Message, deadline: Duration) -> Result<(), ConnectionError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Write(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout(deadline)),
    }
}
