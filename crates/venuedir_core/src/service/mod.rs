//! Venue directory use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into atomic directory operations.
//! - Keep callers decoupled from storage details.

pub mod aggregate;
pub mod directory;
