//! Message Repository Implementation
//!
//! PostgreSQL implementation of [`MessagePersistence`] against the chat
//! service's `chat_messages` and `users` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{AuthorProfile, MessagePersistence, StoredMessage};
use crate::shared::error::CollaboratorError;

/// PostgreSQL message store.
///
/// Inserts the message and loads the author projection in one transaction.
/// A missing author row is `NotFound` and rolls the insert back.
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    /// Creates a new PgMessageStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row returned by the insert.
#[derive(Debug, sqlx::FromRow)]
struct InsertedRow {
    id: i64,
    created_at: DateTime<Utc>,
}

/// Author projection row from the `users` table.
#[derive(Debug, sqlx::FromRow)]
struct AuthorRow {
    first_name: String,
    last_name: String,
    email: String,
    username: Option<String>,
    profile_image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuthorRow {
    fn into_profile(self) -> AuthorProfile {
        AuthorProfile {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            username: self.username.filter(|s| !s.is_empty()),
            image_url: self.profile_image_url.filter(|s| !s.is_empty()),
            created_at: self.created_at,
        }
    }
}

fn require_author(author_id: i64, row: Option<AuthorRow>) -> Result<AuthorProfile, CollaboratorError> {
    row.map(AuthorRow::into_profile)
        .ok_or_else(|| CollaboratorError::NotFound(format!("user {}", author_id)))
}

#[async_trait]
impl MessagePersistence for PgMessageStore {
    async fn create(
        &self,
        author_id: i64,
        chat_id: i64,
        text: &str,
    ) -> Result<StoredMessage, CollaboratorError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, InsertedRow>(
            r#"
            INSERT INTO chat_messages (message, user_id, chat_id)
            VALUES ($1, $2, $3)
            RETURNING id, created_at
            "#,
        )
        .bind(text)
        .bind(author_id)
        .bind(chat_id)
        .fetch_one(&mut *tx)
        .await?;

        let author = sqlx::query_as::<_, AuthorRow>(
            r#"
            SELECT first_name, last_name, email, username, profile_image_url, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(author_id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping `tx` on this early return rolls the insert back.
        let author = require_author(author_id, author)?;

        tx.commit().await?;

        Ok(StoredMessage {
            id: inserted.id,
            chat_id,
            author_id,
            text: text.to_owned(),
            created_at: inserted.created_at,
            author: Some(author),
        })
    }
}
