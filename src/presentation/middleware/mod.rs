//! Middleware
//!
//! Tower middleware for request processing.

pub mod auth;
pub mod logging;

pub use auth::{auth_middleware, AuthError, AuthUser, Authenticator, Claims, JwtAuthenticator};
