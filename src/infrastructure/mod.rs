//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database connection pool (PostgreSQL)
//! - Message and membership collaborators backed by the chat service schema
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod repositories;
