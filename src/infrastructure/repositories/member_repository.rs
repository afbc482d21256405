//! Member Repository Implementation
//!
//! PostgreSQL implementation of [`ChatMembershipResolver`] over `chat_members`.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::ChatMembershipResolver;
use crate::shared::error::CollaboratorError;

/// PostgreSQL chat membership lookup.
pub struct PgChatMembers {
    pool: PgPool,
}

impl PgChatMembers {
    /// Creates a new PgChatMembers with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Convert a 1-based page and limit into `(limit, offset)`.
///
/// Page and limit below 1 are clamped to 1.
fn page_window(page: u32, limit: u32) -> (i64, i64) {
    let limit = i64::from(limit.max(1));
    let page = i64::from(page.max(1));
    (limit, (page - 1) * limit)
}

#[async_trait]
impl ChatMembershipResolver for PgChatMembers {
    async fn list_members(
        &self,
        chat_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<i64>, CollaboratorError> {
        let (limit, offset) = page_window(page, limit);

        let members = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_id
            FROM chat_members
            WHERE chat_id = $1
            ORDER BY user_id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(chat_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }
}
