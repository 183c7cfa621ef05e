//! Core logic for the venue directory.
//! This crate is the single source of truth for venue/event link invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod naming;
pub mod repo;
pub mod service;

pub use config::{DirectoryConfig, NameMatch};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::event_ref::EventVenueRef;
pub use model::venue::{EventId, NewVenue, Venue, VenueId, VenueProperties};
pub use naming::{fallback_name, resolve_unique_name};
pub use repo::invariants::{InvariantReport, InvariantViolation};
pub use repo::link_repo::{LinkChange, SqliteLinkRepository, VenueLinkRepository, VENUE_TO_EVENT};
pub use repo::venue_repo::{
    SqliteVenueRepository, VenueListQuery, VenueRepoError, VenueRepoResult, VenueRepository,
};
pub use service::aggregate::AggregateMaintainer;
pub use service::directory::{DirectoryError, DirectoryResult, VenueDirectoryService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
