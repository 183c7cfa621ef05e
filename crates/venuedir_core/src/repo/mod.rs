//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for venues and event-venue links.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`VenueNotFound`) in addition to
//!   DB transport errors.
//! - Multi-statement writes run through `db::with_write_tx`.

pub mod invariants;
pub mod link_repo;
pub mod venue_repo;
