//! # Domain Entities
//!
//! The few chat-service records the delivery hub touches, and the traits it
//! consumes them through.
//!
//! - **StoredMessage**: a chat message after persistence, with its author profile
//! - **Membership**: the set of users belonging to a chat
//!
//! The traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod member;
mod message;

pub use member::ChatMembershipResolver;
pub use message::{AuthorProfile, MessagePersistence, StoredMessage};

#[cfg(test)]
pub use member::MockChatMembershipResolver;
#[cfg(test)]
pub use message::MockMessagePersistence;
