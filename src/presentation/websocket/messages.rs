//! WebSocket Message Types
//!
//! Chat frames exchanged with clients. Inbound and outbound frames share the
//! same base shape; outbound frames add what persistence assigned.

use serde::{Deserialize, Serialize};

use crate::domain::{AuthorProfile, StoredMessage};

/// Inbound chat frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    pub user_id: i64,
    pub chat_type: String,
    pub chat_id: i64,
    pub message: String,
}

impl ChatFrame {
    /// Decode a raw text frame.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Outbound chat frame pushed to recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredFrame {
    pub id: i64,
    pub user_id: i64,
    pub chat_type: String,
    pub chat_id: i64,
    pub message: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<AuthorProfile>,
}

impl DeliveredFrame {
    /// Build the outbound frame from the inbound one and its stored record.
    ///
    /// Author, chat and text come from the stored record, which is what the
    /// persistence layer actually recorded.
    pub fn new(inbound: ChatFrame, stored: StoredMessage) -> Self {
        Self {
            id: stored.id,
            user_id: stored.author_id,
            chat_type: inbound.chat_type,
            chat_id: stored.chat_id,
            message: stored.text,
            created_at: stored.created_at.to_rfc3339(),
            user_info: stored.author,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
