//! Venue directory domain model.
//!
//! # Responsibility
//! - Define the venue record, its typed property set and event references.
//!
//! # Invariants
//! - Every venue is identified by a stable `VenueId`.
//! - Venue deletion is a soft-delete tombstone; deleted venues are never
//!   returned as `Venue` values.

pub mod event_ref;
pub mod venue;
