//! HTTP Layer
//!
//! Routes and handlers for everything that is not the WebSocket stream itself.

pub mod handlers;
pub mod routes;
