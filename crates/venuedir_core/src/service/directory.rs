//! Venue directory use-case service.
//!
//! # Responsibility
//! - Assign venues to events by name or id, creating venues on demand.
//! - Delete venues with cascading link removal.
//! - Keep derived venue counts in step with every link mutation.
//!
//! # Invariants
//! - Each mutation runs as one `BEGIN IMMEDIATE` unit; it fully commits or
//!   fully rolls back.
//! - Every link change is followed by aggregate recomputation of the
//!   previous and new venue inside the same unit.
//! - With `verify_invariants`, touched rows are re-checked before commit.

use crate::config::DirectoryConfig;
use crate::db::{with_read_snapshot, with_write_tx, DbError};
use crate::model::event_ref::EventVenueRef;
use crate::model::venue::{EventId, NewVenue, Venue, VenueId, VenueProperties};
use crate::repo::invariants::{audit, check_scope, InvariantReport};
use crate::repo::link_repo::{SqliteLinkRepository, VenueLinkRepository};
use crate::repo::venue_repo::{
    SqliteVenueRepository, VenueListQuery, VenueRepoError, VenueRepository,
};
use crate::service::aggregate::AggregateMaintainer;
use log::{error, info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors from venue directory operations.
#[derive(Debug)]
pub enum DirectoryError {
    /// Venue id does not resolve to a live venue.
    VenueNotFound(VenueId),
    /// Write lock stayed busy through every allowed attempt; retry later.
    LockTimeout { attempts: u32 },
    /// Post-mutation consistency check failed; the unit was rolled back.
    InvariantViolation(String),
    /// Storage-level failure.
    Repo(VenueRepoError),
}

impl DirectoryError {
    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::VenueNotFound(_) => "venue_not_found",
            Self::LockTimeout { .. } => "lock_timeout",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::Repo(_) => "storage_error",
        }
    }

    fn is_lock_contention(&self) -> bool {
        matches!(self, Self::Repo(err) if err.is_lock_contention())
    }
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VenueNotFound(id) => write!(f, "venue not found: {id}"),
            Self::LockTimeout { attempts } => {
                write!(f, "venue directory lock busy after {attempts} attempts")
            }
            Self::InvariantViolation(details) => {
                write!(f, "venue directory invariant violated: {details}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<VenueRepoError> for DirectoryError {
    fn from(value: VenueRepoError) -> Self {
        match value {
            VenueRepoError::VenueNotFound(id) => Self::VenueNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for DirectoryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(VenueRepoError::Db(DbError::Sqlite(value)))
    }
}

/// Venue directory facade over one SQLite connection.
pub struct VenueDirectoryService<'conn> {
    conn: &'conn Connection,
    config: DirectoryConfig,
}

impl<'conn> VenueDirectoryService<'conn> {
    /// Creates a service on a migrated connection.
    ///
    /// The connection busy timeout should match `config.lock_timeout_ms`;
    /// `open_db_with_config` sets it.
    pub fn new(conn: &'conn Connection, config: DirectoryConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Assigns the venue called `venue_name` to `event_id`.
    ///
    /// # Contract
    /// - The name is trimmed; an empty name clears the event's venue.
    /// - No-op when the event's current venue already has this name.
    /// - Links to an existing venue with this name when there is one.
    /// - Otherwise creates the venue from `seed` (name overridden) with an
    ///   event count of 1 and links it; only the previous venue is recounted.
    pub fn assign_by_name(
        &self,
        event_id: EventId,
        venue_name: &str,
        seed: &VenueProperties,
    ) -> DirectoryResult<Option<Venue>> {
        let venue_name = venue_name.trim();
        if venue_name.is_empty() {
            return self.assign_by_id(event_id, None);
        }

        self.run_unit("venue_assign_by_name", |conn| {
            let venues = self.venue_repo(conn);
            let links = SqliteLinkRepository::new(conn);

            if let Some(current_id) = links.venue_for_event(event_id)? {
                if let Some(current) = venues.get_venue(current_id)? {
                    if self.config.name_match.matches(&current.name, venue_name) {
                        return Ok(Some(current));
                    }
                }
            }

            if let Some(existing) = venues.find_by_name(venue_name)? {
                return self.relink(conn, &venues, &links, event_id, Some(existing.id));
            }

            let mut properties = seed.clone();
            properties.name = Some(venue_name.to_string());
            let created = venues.create_venue(
                &NewVenue::from_properties(properties).with_seed_event_count(1),
            )?;
            let change = links.set_link(event_id, created.id)?;
            // The new venue was seeded with its single link already counted.
            AggregateMaintainer::new(&venues, &links).recompute_many(change.previous)?;
            self.verify(conn, &change.touched_venues(), &[event_id])?;

            info!(
                "event=venue_created module=directory status=ok venue_id={} event_id={}",
                created.id, event_id
            );
            Ok(Some(created))
        })
    }

    /// Points `event_id` at `venue_id`, or clears its venue when `None`.
    ///
    /// Returns the venue the event points at afterwards.
    pub fn assign_by_id(
        &self,
        event_id: EventId,
        venue_id: Option<VenueId>,
    ) -> DirectoryResult<Option<Venue>> {
        self.run_unit("venue_assign_by_id", |conn| {
            let venues = self.venue_repo(conn);
            let links = SqliteLinkRepository::new(conn);
            self.relink(conn, &venues, &links, event_id, venue_id)
        })
    }

    /// Deletes a venue and detaches every event linked to it.
    ///
    /// Returns the detached event ids.
    pub fn delete_venue(&self, venue_id: VenueId) -> DirectoryResult<Vec<EventId>> {
        self.run_unit("venue_delete", |conn| {
            let detached = self.venue_repo(conn).delete_venue(venue_id)?;
            self.verify(conn, &[venue_id], &detached)?;
            Ok(detached)
        })
    }

    /// Creates a standalone venue with no linked events.
    pub fn create_venue(&self, properties: &VenueProperties) -> DirectoryResult<Venue> {
        self.run_unit("venue_create", |conn| {
            let venue = self
                .venue_repo(conn)
                .create_venue(&NewVenue::from_properties(properties.clone()))?;
            self.verify(conn, &[venue.id], &[])?;
            Ok(venue)
        })
    }

    /// Updates venue properties; renames refresh linked event references.
    pub fn update_venue(
        &self,
        venue_id: VenueId,
        patch: &VenueProperties,
    ) -> DirectoryResult<Venue> {
        self.run_unit("venue_update", |conn| {
            let venue = self.venue_repo(conn).update_venue(venue_id, patch)?;
            let linked = SqliteLinkRepository::new(conn).events_for_venue(venue_id)?;
            self.verify(conn, &[venue_id], &linked)?;
            Ok(venue)
        })
    }

    pub fn get_venue(&self, venue_id: VenueId) -> DirectoryResult<Option<Venue>> {
        self.venue_repo(self.conn)
            .get_venue(venue_id)
            .map_err(Into::into)
    }

    pub fn find_by_name(&self, name: &str) -> DirectoryResult<Option<Venue>> {
        self.venue_repo(self.conn)
            .find_by_name(name)
            .map_err(Into::into)
    }

    pub fn get_venue_for_event(&self, event_id: EventId) -> DirectoryResult<Option<VenueId>> {
        SqliteLinkRepository::new(self.conn)
            .venue_for_event(event_id)
            .map_err(Into::into)
    }

    /// Loads the full venue record linked to `event_id`.
    pub fn venue_for_event(&self, event_id: EventId) -> DirectoryResult<Option<Venue>> {
        with_read_snapshot(self.conn, |conn| -> DirectoryResult<Option<Venue>> {
            match SqliteLinkRepository::new(conn).venue_for_event(event_id)? {
                Some(venue_id) => Ok(self.venue_repo(conn).get_venue(venue_id)?),
                None => Ok(None),
            }
        })
    }

    pub fn event_has_venue(&self, event_id: EventId) -> DirectoryResult<bool> {
        Ok(self.get_venue_for_event(event_id)?.is_some())
    }

    pub fn event_reference(&self, event_id: EventId) -> DirectoryResult<Option<EventVenueRef>> {
        SqliteLinkRepository::new(self.conn)
            .event_reference(event_id)
            .map_err(Into::into)
    }

    pub fn events_for_venue(&self, venue_id: VenueId) -> DirectoryResult<Vec<EventId>> {
        SqliteLinkRepository::new(self.conn)
            .events_for_venue(venue_id)
            .map_err(Into::into)
    }

    pub fn list_venues(&self, query: &VenueListQuery) -> DirectoryResult<Vec<Venue>> {
        self.venue_repo(self.conn)
            .list_venues(query)
            .map_err(Into::into)
    }

    /// Checks every directory invariant over the whole database.
    pub fn audit(&self) -> DirectoryResult<InvariantReport> {
        with_read_snapshot(self.conn, |conn| -> DirectoryResult<InvariantReport> {
            Ok(audit(conn, self.config.name_match)?)
        })
    }

    fn venue_repo<'c>(&self, conn: &'c Connection) -> SqliteVenueRepository<'c> {
        SqliteVenueRepository::new(conn, self.config.name_match)
    }

    fn relink(
        &self,
        conn: &Connection,
        venues: &SqliteVenueRepository<'_>,
        links: &SqliteLinkRepository<'_>,
        event_id: EventId,
        venue_id: Option<VenueId>,
    ) -> DirectoryResult<Option<Venue>> {
        let change = match venue_id {
            Some(venue_id) => links.set_link(event_id, venue_id)?,
            None => links.clear_link(event_id)?,
        };
        AggregateMaintainer::new(venues, links).recompute_many(change.touched_venues())?;
        self.verify(conn, &change.touched_venues(), &[event_id])?;

        match change.current {
            Some(venue_id) => venues.get_venue(venue_id)?.map(Some).ok_or_else(|| {
                DirectoryError::InvariantViolation(format!(
                    "linked venue {venue_id} is not readable after relink"
                ))
            }),
            None => Ok(None),
        }
    }

    fn verify(
        &self,
        conn: &Connection,
        venues: &[VenueId],
        events: &[EventId],
    ) -> DirectoryResult<()> {
        if !self.config.verify_invariants {
            return Ok(());
        }

        let report = check_scope(conn, self.config.name_match, venues, events)?;
        if report.is_clean() {
            return Ok(());
        }
        let details = report
            .violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(DirectoryError::InvariantViolation(details))
    }

    fn run_unit<T>(
        &self,
        operation: &'static str,
        mut body: impl FnMut(&Connection) -> DirectoryResult<T>,
    ) -> DirectoryResult<T> {
        let started_at = Instant::now();
        let max_attempts = self.config.max_attempts();
        let mut attempt = 1;

        loop {
            match with_write_tx(self.conn, |conn| body(conn)) {
                Ok(value) => {
                    info!(
                        "event={operation} module=directory status=ok attempts={attempt} duration_ms={}",
                        started_at.elapsed().as_millis()
                    );
                    return Ok(value);
                }
                Err(err) if err.is_lock_contention() && attempt < max_attempts => {
                    warn!(
                        "event={operation} module=directory status=retry attempt={attempt} max_attempts={max_attempts}"
                    );
                    attempt += 1;
                }
                Err(err) if err.is_lock_contention() => {
                    error!(
                        "event={operation} module=directory status=error attempts={attempt} duration_ms={} error_code=lock_timeout",
                        started_at.elapsed().as_millis()
                    );
                    return Err(DirectoryError::LockTimeout { attempts: attempt });
                }
                Err(err) => {
                    error!(
                        "event={operation} module=directory status=error attempts={attempt} duration_ms={} error_code={} error={}",
                        started_at.elapsed().as_millis(),
                        err.code(),
                        err
                    );
                    return Err(err);
                }
            }
        }
    }
}
