//! Event-to-venue link repository and SQLite implementation.
//!
//! # Responsibility
//! - Own the `venue_to_event` relation rows and the event-side reference.
//! - Report the previous and new venue of every link mutation so callers can
//!   refresh exactly the affected aggregates.
//!
//! # Invariants
//! - At most one link per event (primary key `relation, event_uuid`).
//! - Links only ever target live venues.
//! - `event_refs` mirrors the link: same venue id and current venue name, or
//!   empty when the event has no link.

use crate::db::with_write_tx;
use crate::model::event_ref::EventVenueRef;
use crate::model::venue::{EventId, VenueId};
use crate::repo::venue_repo::{live_venue_name, parse_uuid, VenueRepoError, VenueRepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Relation label for venue-to-event links.
pub const VENUE_TO_EVENT: &str = "venue_to_event";

/// Outcome of one link mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkChange {
    /// Venue the event pointed at before the call.
    pub previous: Option<VenueId>,
    /// Venue the event points at after the call.
    pub current: Option<VenueId>,
}

impl LinkChange {
    /// Returns whether the call left the link untouched.
    pub fn is_noop(&self) -> bool {
        self.previous == self.current
    }

    /// Distinct venues whose aggregates may have changed.
    pub fn touched_venues(&self) -> Vec<VenueId> {
        let mut touched = Vec::with_capacity(2);
        touched.extend(self.previous);
        if self.current != self.previous {
            touched.extend(self.current);
        }
        touched
    }
}

/// Repository interface for event-venue links.
pub trait VenueLinkRepository {
    /// Venue currently linked to `event_id`.
    fn venue_for_event(&self, event_id: EventId) -> VenueRepoResult<Option<VenueId>>;
    /// Links `event_id` to `venue_id`, replacing any previous link.
    fn set_link(&self, event_id: EventId, venue_id: VenueId) -> VenueRepoResult<LinkChange>;
    /// Removes the link of `event_id`, if any.
    fn clear_link(&self, event_id: EventId) -> VenueRepoResult<LinkChange>;
    /// Events linked to `venue_id`, ordered by id.
    fn events_for_venue(&self, venue_id: VenueId) -> VenueRepoResult<Vec<EventId>>;
    /// Number of events linked to `venue_id`, by enumeration.
    fn count_for_venue(&self, venue_id: VenueId) -> VenueRepoResult<u32>;
    /// Removes every link targeting `venue_id` and returns the detached events.
    fn detach_venue(&self, venue_id: VenueId) -> VenueRepoResult<Vec<EventId>>;
    /// Rewrites the denormalized venue name on linked events.
    fn refresh_venue_name(&self, venue_id: VenueId, name: &str) -> VenueRepoResult<usize>;
    /// Loads the event-side reference row, if the event was ever linked.
    fn event_reference(&self, event_id: EventId) -> VenueRepoResult<Option<EventVenueRef>>;
}

/// SQLite-backed link repository.
pub struct SqliteLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLinkRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl VenueLinkRepository for SqliteLinkRepository<'_> {
    fn venue_for_event(&self, event_id: EventId) -> VenueRepoResult<Option<VenueId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT venue_uuid
                 FROM venue_links
                 WHERE relation = ?1
                   AND event_uuid = ?2;",
                params![VENUE_TO_EVENT, event_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|text| parse_uuid(&text, "venue_links.venue_uuid"))
            .transpose()
    }

    fn set_link(&self, event_id: EventId, venue_id: VenueId) -> VenueRepoResult<LinkChange> {
        with_write_tx(self.conn, |conn| {
            let venue_name = live_venue_name(conn, venue_id)?
                .ok_or(VenueRepoError::VenueNotFound(venue_id))?;

            let previous = self.venue_for_event(event_id)?;
            let change = LinkChange {
                previous,
                current: Some(venue_id),
            };
            if change.is_noop() {
                return Ok(change);
            }

            let event_uuid = event_id.to_string();
            conn.execute(
                "DELETE FROM venue_links
                 WHERE relation = ?1
                   AND event_uuid = ?2;",
                params![VENUE_TO_EVENT, event_uuid],
            )?;
            conn.execute(
                "INSERT INTO venue_links (relation, event_uuid, venue_uuid)
                 VALUES (?1, ?2, ?3);",
                params![VENUE_TO_EVENT, event_uuid, venue_id.to_string()],
            )?;
            conn.execute(
                "INSERT INTO event_refs (event_uuid, venue_uuid, venue_name)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (event_uuid) DO UPDATE
                 SET
                    venue_uuid = excluded.venue_uuid,
                    venue_name = excluded.venue_name,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![event_uuid, venue_id.to_string(), venue_name],
            )?;

            Ok(change)
        })
    }

    fn clear_link(&self, event_id: EventId) -> VenueRepoResult<LinkChange> {
        with_write_tx(self.conn, |conn| {
            let previous = self.venue_for_event(event_id)?;
            let change = LinkChange {
                previous,
                current: None,
            };
            if previous.is_none() {
                return Ok(change);
            }

            let event_uuid = event_id.to_string();
            conn.execute(
                "DELETE FROM venue_links
                 WHERE relation = ?1
                   AND event_uuid = ?2;",
                params![VENUE_TO_EVENT, event_uuid],
            )?;
            conn.execute(
                "UPDATE event_refs
                 SET
                    venue_uuid = NULL,
                    venue_name = '',
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE event_uuid = ?1;",
                [event_uuid],
            )?;

            Ok(change)
        })
    }

    fn events_for_venue(&self, venue_id: VenueId) -> VenueRepoResult<Vec<EventId>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_uuid
             FROM venue_links
             WHERE relation = ?1
               AND venue_uuid = ?2
             ORDER BY event_uuid ASC;",
        )?;
        let mut rows = stmt.query(params![VENUE_TO_EVENT, venue_id.to_string()])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            events.push(parse_uuid(&value, "venue_links.event_uuid")?);
        }
        Ok(events)
    }

    fn count_for_venue(&self, venue_id: VenueId) -> VenueRepoResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM venue_links
             WHERE relation = ?1
               AND venue_uuid = ?2;",
            params![VENUE_TO_EVENT, venue_id.to_string()],
            |row| row.get(0),
        )?;
        u32::try_from(count).map_err(|_| {
            VenueRepoError::InvalidData(format!("link count `{count}` exceeds u32 range"))
        })
    }

    fn detach_venue(&self, venue_id: VenueId) -> VenueRepoResult<Vec<EventId>> {
        with_write_tx(self.conn, |conn| {
            let events = self.events_for_venue(venue_id)?;
            let venue_uuid = venue_id.to_string();

            conn.execute(
                "DELETE FROM venue_links
                 WHERE relation = ?1
                   AND venue_uuid = ?2;",
                params![VENUE_TO_EVENT, venue_uuid],
            )?;
            conn.execute(
                "UPDATE event_refs
                 SET
                    venue_uuid = NULL,
                    venue_name = '',
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE venue_uuid = ?1;",
                [venue_uuid],
            )?;

            Ok(events)
        })
    }

    fn refresh_venue_name(&self, venue_id: VenueId, name: &str) -> VenueRepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE event_refs
             SET
                venue_name = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE venue_uuid = ?1;",
            params![venue_id.to_string(), name],
        )?;
        Ok(changed)
    }

    fn event_reference(&self, event_id: EventId) -> VenueRepoResult<Option<EventVenueRef>> {
        let row: Option<(Option<String>, String, i64)> = self
            .conn
            .query_row(
                "SELECT venue_uuid, venue_name, updated_at
                 FROM event_refs
                 WHERE event_uuid = ?1;",
                [event_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((venue_uuid, venue_name, updated_at)) = row else {
            return Ok(None);
        };
        let venue_id = venue_uuid
            .map(|text| parse_uuid(&text, "event_refs.venue_uuid"))
            .transpose()?;
        Ok(Some(EventVenueRef {
            event_id,
            venue_id,
            venue_name,
            updated_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::LinkChange;
    use uuid::Uuid;

    #[test]
    fn touched_venues_lists_each_venue_once() {
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();

        let moved = LinkChange {
            previous: Some(old),
            current: Some(new),
        };
        assert_eq!(moved.touched_venues(), vec![old, new]);
        assert!(!moved.is_noop());

        let same = LinkChange {
            previous: Some(old),
            current: Some(old),
        };
        assert_eq!(same.touched_venues(), vec![old]);
        assert!(same.is_noop());

        let cleared = LinkChange {
            previous: None,
            current: None,
        };
        assert!(cleared.touched_venues().is_empty());
    }
}
