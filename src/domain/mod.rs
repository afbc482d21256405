//! # Domain Layer
//!
//! Records and collaborator contracts shared by the hub and the
//! infrastructure that backs it.
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Collaborator traits define the data access contracts
//! - The hub only ever sees these traits, never a concrete database

pub mod entities;

pub use entities::*;
