//! HTTP Handlers
//!
//! Request handlers for the service's HTTP endpoints.

pub mod health;
