//! WebSocket Delivery
//!
//! Real-time chat delivery: the fan-out hub and the per-client connections
//! that feed it.

pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;

pub use connection::{Connection, ConnectionError};
pub use handler::ws_handler;
pub use hub::{ConnectionHandle, ConnectionKey, Frame, Hub, HubError, HubHandle, InboundFrame};
pub use messages::{ChatFrame, DeliveredFrame};
