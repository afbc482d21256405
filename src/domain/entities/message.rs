//! Chat message entity and persistence trait.
//!
//! Maps to the `chat_messages` table owned by the chat service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::CollaboratorError;

/// Author profile projection attached to a stored message.
///
/// Loaded from the `users` table at persistence time:
/// - first_name, last_name, email: NOT NULL
/// - username, profile_image_url: NULL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A chat message after it has been durably recorded.
///
/// The `id` and `created_at` are assigned by the persistence collaborator;
/// inbound frames never carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub chat_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Optional for stores that do not project authors; the Postgres store always sets it.
    pub author: Option<AuthorProfile>,
}

/// Durable message storage.
///
/// Implementations must be safe to call from many pipeline tasks at once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePersistence: Send + Sync {
    /// Record a message and return the stored, enriched record.
    async fn create(
        &self,
        author_id: i64,
        chat_id: i64,
        text: &str,
    ) -> Result<StoredMessage, CollaboratorError>;
}
