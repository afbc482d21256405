//! Fan-out Hub
//!
//! Owns the user → connection registry and performs message fan-out.
//!
//! All registry access happens inside [`Hub::run`]. Connections talk to the
//! hub only through a [`HubHandle`], whose operations become events on
//! dedicated channels. Persisting a message and resolving its chat members
//! run on a separate task per message; only the finished fan-out is handed
//! back to the loop, so a slow collaborator never stalls registration or
//! delivery of other messages. When every pipeline slot is taken the loop
//! stops reading inbound frames and keeps serving everything else.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::messages::{ChatFrame, DeliveredFrame};
use crate::config::HubSettings;
use crate::domain::{ChatMembershipResolver, MessagePersistence};
use crate::infrastructure::metrics;
use crate::shared::error::CollaboratorError;

/// Serialized outbound frame, shared between all recipients of one message.
pub type Frame = Arc<str>;

const REGISTER_QUEUE_CAPACITY: usize = 64;
const QUERY_QUEUE_CAPACITY: usize = 16;

/// Identity of one physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub user_id: i64,
    pub connection_id: Uuid,
}

/// Hub-side half of a connection: its identity and the sending end of its
/// outbound mailbox.
///
/// The hub holds the only sender, so dropping the handle closes the mailbox.
#[derive(Debug)]
pub struct ConnectionHandle {
    key: ConnectionKey,
    mailbox: mpsc::Sender<Frame>,
}

impl ConnectionHandle {
    /// Create a handle with a fresh bounded mailbox, returning the receiving
    /// end for the connection's outbound pump.
    pub fn with_mailbox(
        user_id: i64,
        connection_id: Uuid,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = Self {
            key: ConnectionKey {
                user_id,
                connection_id,
            },
            mailbox: tx,
        };
        (handle, rx)
    }

    pub fn key(&self) -> ConnectionKey {
        self.key
    }
}

/// Raw text frame read from a client, tagged with the authenticated sender.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub sender_id: i64,
    pub payload: String,
}

/// Hub errors
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("hub is not running")]
    Closed,
}

enum HubQuery {
    ConnectionCount(oneshot::Sender<usize>),
    IsOnline(i64, oneshot::Sender<bool>),
}

/// A persisted message ready for fan-out.
struct Delivery {
    author_id: i64,
    chat_id: i64,
    frame: Frame,
    recipients: Vec<i64>,
}

/// Cloneable handle used by connections and HTTP handlers to reach the hub.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<ConnectionHandle>,
    unregister_tx: mpsc::UnboundedSender<ConnectionKey>,
    inbound_tx: mpsc::Sender<InboundFrame>,
    query_tx: mpsc::Sender<HubQuery>,
}

impl HubHandle {
    /// Admit a connection to the registry, replacing any earlier connection
    /// of the same user.
    pub async fn register(&self, connection: ConnectionHandle) -> Result<(), HubError> {
        self.register_tx
            .send(connection)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Withdraw a connection. A no-op if the registry holds a different
    /// connection for the user, or none at all.
    ///
    /// Never blocks, so it is safe to call from any cleanup path.
    pub fn unregister(&self, key: ConnectionKey) {
        if self.unregister_tx.send(key).is_err() {
            tracing::debug!(
                user_id = key.user_id,
                connection_id = %key.connection_id,
                "Hub already stopped; unregister skipped"
            );
        }
    }

    /// Queue an inbound frame for processing. Waits while the inbound queue
    /// is full.
    pub async fn publish(&self, frame: InboundFrame) -> Result<(), HubError> {
        self.inbound_tx
            .send(frame)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Number of connections currently in the registry.
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (tx, rx) = oneshot::channel();
        self.query_tx
            .send(HubQuery::ConnectionCount(tx))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Whether the user has a registered connection.
    pub async fn is_online(&self, user_id: i64) -> Result<bool, HubError> {
        let (tx, rx) = oneshot::channel();
        self.query_tx
            .send(HubQuery::IsOnline(user_id, tx))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

/// Persist → resolve steps for one message, run off the hub loop.
struct Pipeline {
    persistence: Arc<dyn MessagePersistence>,
    members: Arc<dyn ChatMembershipResolver>,
    call_timeout: Duration,
    page_limit: u32,
}

impl Pipeline {
    async fn run(&self, message: ChatFrame) -> Option<Delivery> {
        let started = Instant::now();
        let author_id = message.user_id;
        let chat_id = message.chat_id;

        let stored = match self
            .bounded(self.persistence.create(author_id, chat_id, &message.message))
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(author_id, chat_id, error = %e, "Failed to persist chat message");
                metrics::record_message("persist_failed");
                return None;
            }
        };

        let recipients = match self
            .bounded(self.members.list_members(chat_id, 1, self.page_limit))
            .await
        {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(author_id, chat_id, error = %e, "Failed to resolve chat members");
                metrics::record_message("resolve_failed");
                return None;
            }
        };

        let frame = match DeliveredFrame::new(message, stored).encode() {
            Ok(text) => Frame::from(text),
            Err(e) => {
                tracing::error!(author_id, chat_id, error = %e, "Failed to encode outbound frame");
                metrics::record_message("encode_failed");
                return None;
            }
        };

        metrics::observe_pipeline(started.elapsed().as_secs_f64());

        Some(Delivery {
            author_id,
            chat_id,
            frame,
            recipients,
        })
    }

    /// Collaborator call with the configured deadline; expiry is an ordinary failure.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, CollaboratorError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .unwrap_or_else(|_| Err(CollaboratorError::Timeout(self.call_timeout)))
    }
}

/// The hub control loop and the registry it owns.
pub struct Hub {
    registry: HashMap<i64, ConnectionHandle>,
    register_rx: mpsc::Receiver<ConnectionHandle>,
    unregister_rx: mpsc::UnboundedReceiver<ConnectionKey>,
    inbound_rx: mpsc::Receiver<InboundFrame>,
    query_rx: mpsc::Receiver<HubQuery>,
    delivery_tx: mpsc::UnboundedSender<Option<Delivery>>,
    delivery_rx: mpsc::UnboundedReceiver<Option<Delivery>>,
    pipeline: Arc<Pipeline>,
    in_flight: Arc<Semaphore>,
}

impl Hub {
    pub fn new(
        settings: &HubSettings,
        persistence: Arc<dyn MessagePersistence>,
        members: Arc<dyn ChatMembershipResolver>,
    ) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(REGISTER_QUEUE_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(settings.inbound_queue_capacity);
        let (query_tx, query_rx) = mpsc::channel(QUERY_QUEUE_CAPACITY);
        // At most `max_in_flight` pending deliveries; the loop never waits on its own queue.
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();

        let hub = Self {
            registry: HashMap::new(),
            register_rx,
            unregister_rx,
            inbound_rx,
            query_rx,
            delivery_tx,
            delivery_rx,
            pipeline: Arc::new(Pipeline {
                persistence,
                members,
                call_timeout: settings.collaborator_timeout(),
                page_limit: settings.members_page_limit,
            }),
            in_flight: Arc::new(Semaphore::new(settings.max_in_flight)),
        };

        let handle = HubHandle {
            register_tx,
            unregister_tx,
            inbound_tx,
            query_tx,
        };

        (hub, handle)
    }

    /// Build a hub and run it on its own task.
    pub fn spawn(
        settings: &HubSettings,
        persistence: Arc<dyn MessagePersistence>,
        members: Arc<dyn ChatMembershipResolver>,
    ) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(settings, persistence, members);
        (handle, tokio::spawn(hub.run()))
    }

    /// Run the control loop until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        tracing::info!("Hub started");

        loop {
            tokio::select! {
                biased;

                registration = self.register_rx.recv() => match registration {
                    Some(connection) => self.register(connection),
                    None => break,
                },
                Some(key) = self.unregister_rx.recv() => self.unregister(key),
                // `None` is a pipeline that dropped its message; its slot is free again.
                Some(finished) = self.delivery_rx.recv() => {
                    if let Some(delivery) = finished {
                        self.fan_out(delivery);
                    }
                }
                Some(query) = self.query_rx.recv() => self.answer(query),
                Some(inbound) = self.inbound_rx.recv(), if self.in_flight.available_permits() > 0 => {
                    self.accept(inbound);
                }
            }
        }

        tracing::info!(remaining = self.registry.len(), "Hub stopped");
    }

    fn register(&mut self, connection: ConnectionHandle) {
        let key = connection.key;

        if let Some(previous) = self.registry.insert(key.user_id, connection) {
            // `previous` drops here, closing its mailbox; its pumps wind down
            // and their unregister is then stale.
            tracing::info!(
                user_id = key.user_id,
                connection_id = %previous.key.connection_id,
                "Closing superseded connection"
            );
            metrics::record_eviction("superseded");
        }

        tracing::info!(
            user_id = key.user_id,
            connection_id = %key.connection_id,
            "Client connected"
        );
        metrics::set_active_connections(self.registry.len());
    }

    fn unregister(&mut self, key: ConnectionKey) {
        match self.registry.get(&key.user_id) {
            Some(current) if current.key == key => {
                self.registry.remove(&key.user_id);
                tracing::info!(
                    user_id = key.user_id,
                    connection_id = %key.connection_id,
                    "Client disconnected"
                );
                metrics::set_active_connections(self.registry.len());
            }
            _ => {
                tracing::debug!(
                    user_id = key.user_id,
                    connection_id = %key.connection_id,
                    "Ignoring stale unregister"
                );
            }
        }
    }

    fn answer(&self, query: HubQuery) {
        match query {
            HubQuery::ConnectionCount(reply) => {
                let _ = reply.send(self.registry.len());
            }
            HubQuery::IsOnline(user_id, reply) => {
                let _ = reply.send(self.registry.contains_key(&user_id));
            }
        }
    }

    /// Decode an inbound frame and start its pipeline.
    ///
    /// Only called while a pipeline slot is free.
    fn accept(&mut self, inbound: InboundFrame) {
        let message = match ChatFrame::decode(&inbound.payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(sender_id = inbound.sender_id, error = %e, "Discarding malformed chat frame");
                metrics::record_message("decode_failed");
                return;
            }
        };

        if message.user_id != inbound.sender_id {
            tracing::warn!(
                sender_id = inbound.sender_id,
                claimed_user_id = message.user_id,
                "Discarding chat frame with mismatched author"
            );
            metrics::record_message("rejected");
            return;
        }

        let Ok(permit) = Arc::clone(&self.in_flight).try_acquire_owned() else {
            tracing::warn!(sender_id = inbound.sender_id, "No pipeline slot free, dropping chat frame");
            metrics::record_message("overloaded");
            return;
        };

        let pipeline = Arc::clone(&self.pipeline);
        let deliveries = self.delivery_tx.clone();
        tokio::spawn(async move {
            let delivery = pipeline.run(message).await;
            // Released before the loop hears back, so it can read inbound again.
            drop(permit);
            let _ = deliveries.send(delivery);
        });
    }

    /// Push a persisted message to every live member except its author.
    fn fan_out(&mut self, delivery: Delivery) {
        let mut delivered = 0usize;

        for &member_id in &delivery.recipients {
            if member_id == delivery.author_id {
                continue;
            }

            let Some(connection) = self.registry.get(&member_id) else {
                continue;
            };

            match connection.mailbox.try_send(Arc::clone(&delivery.frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => self.evict(member_id, "mailbox_full"),
                Err(TrySendError::Closed(_)) => self.evict(member_id, "mailbox_closed"),
            }
        }

        metrics::record_message(if delivered > 0 {
            "delivered"
        } else {
            "no_recipients"
        });
        tracing::debug!(
            author_id = delivery.author_id,
            chat_id = delivery.chat_id,
            members = delivery.recipients.len(),
            delivered,
            "Fan-out complete"
        );
    }

    fn evict(&mut self, user_id: i64, reason: &'static str) {
        if let Some(connection) = self.registry.remove(&user_id) {
            tracing::warn!(
                user_id,
                connection_id = %connection.key.connection_id,
                reason,
                "Evicting connection"
            );
            metrics::record_eviction(reason);
            metrics::set_active_connections(self.registry.len());
        }
    }
}
