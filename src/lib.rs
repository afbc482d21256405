//! # Chat Realtime Library
//!
//! This crate provides a real-time chat delivery service with:
//! - A WebSocket endpoint authenticated by JWT
//! - A single fan-out hub that persists each message and delivers it to
//!   every other online member of the chat
//! - PostgreSQL for message storage and chat membership
//! - Health and Prometheus metrics endpoints
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Message entities and the collaborator traits the hub depends on
//! - **Infrastructure Layer**: Database pool, Postgres collaborators and metrics
//! - **Presentation Layer**: HTTP routes, auth middleware and the WebSocket hub
//!
//! ## Module Structure
//!
//! ```text
//! chat_realtime/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities and collaborator traits
//! +-- infrastructure/ Database, repositories and metrics
//! +-- presentation/   HTTP routes, middleware and WebSocket delivery
//! +-- shared/         Common error types
//! ```

// Configuration module
pub mod config;

// Domain layer - Core entities and collaborator traits
pub mod domain;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
