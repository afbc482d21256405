//! Repository Implementations
//!
//! PostgreSQL-backed collaborators for the delivery hub.

mod member_repository;
mod message_repository;

pub use member_repository::PgChatMembers;
pub use message_repository::PgMessageStore;
