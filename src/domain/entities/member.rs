//! Chat membership lookup trait.
//!
//! Maps to the `chat_members` table owned by the chat service.

use async_trait::async_trait;

use crate::shared::error::CollaboratorError;

/// Resolves the current members of a chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatMembershipResolver: Send + Sync {
    /// List member user IDs of a chat.
    ///
    /// `page` is 1-based. Callers that need every member pass a limit large
    /// enough to cover the whole chat rather than paging interactively.
    async fn list_members(
        &self,
        chat_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<i64>, CollaboratorError>;
}
