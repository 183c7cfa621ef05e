//! Cross-table consistency checks for venues, links and event references.
//!
//! # Responsibility
//! - Verify the directory invariants for a set of venues and events.
//! - Provide a full-database audit built from the same per-row checks.
//!
//! # Invariants
//! - Checks are read-only and may run inside an open write transaction.

use crate::config::NameMatch;
use crate::model::venue::{EventId, VenueId};
use crate::repo::link_repo::VENUE_TO_EVENT;
use crate::repo::venue_repo::{parse_uuid, VenueRepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// An event is the source of more than one link.
    MultipleLinks { event_id: EventId, links: u32 },
    /// A venue's stored count differs from its enumerated links.
    CountMismatch {
        venue_id: VenueId,
        stored: u32,
        linked: u32,
    },
    /// A link targets a missing or deleted venue.
    DanglingLink {
        event_id: EventId,
        venue_id: VenueId,
    },
    /// Several live venues share one name.
    DuplicateName { venue_id: VenueId, holders: u32 },
    /// An event reference disagrees with the event's link.
    StaleEventRef { event_id: EventId },
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultipleLinks { event_id, links } => {
                write!(f, "event {event_id} has {links} venue links")
            }
            Self::CountMismatch {
                venue_id,
                stored,
                linked,
            } => write!(
                f,
                "venue {venue_id} stores event_count {stored} but has {linked} links"
            ),
            Self::DanglingLink { event_id, venue_id } => {
                write!(f, "event {event_id} links to missing venue {venue_id}")
            }
            Self::DuplicateName { venue_id, holders } => {
                write!(f, "venue {venue_id} shares its name with {holders} live venues")
            }
            Self::StaleEventRef { event_id } => {
                write!(f, "event {event_id} venue reference disagrees with its link")
            }
        }
    }
}

/// Result of an invariant check run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvariantReport {
    pub venues_checked: usize,
    pub events_checked: usize,
    pub violations: Vec<InvariantViolation>,
}

impl InvariantReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Checks the given venues and events only.
pub fn check_scope(
    conn: &Connection,
    name_match: NameMatch,
    venues: &[VenueId],
    events: &[EventId],
) -> VenueRepoResult<InvariantReport> {
    let venues: BTreeSet<VenueId> = venues.iter().copied().collect();
    let events: BTreeSet<EventId> = events.iter().copied().collect();

    let mut report = InvariantReport {
        venues_checked: venues.len(),
        events_checked: events.len(),
        violations: Vec::new(),
    };
    for venue_id in venues {
        check_venue(conn, name_match, venue_id, &mut report.violations)?;
    }
    for event_id in events {
        check_event(conn, event_id, &mut report.violations)?;
    }
    Ok(report)
}

/// Checks every live venue and every event that has a link or a reference.
pub fn audit(conn: &Connection, name_match: NameMatch) -> VenueRepoResult<InvariantReport> {
    let venues = collect_ids(
        conn,
        "SELECT uuid FROM venues WHERE is_deleted = 0;",
        "venues.uuid",
    )?;
    let events = collect_ids(
        conn,
        "SELECT event_uuid FROM venue_links
         UNION
         SELECT event_uuid FROM event_refs;",
        "event_uuid",
    )?;
    check_scope(conn, name_match, &venues, &events)
}

fn check_venue(
    conn: &Connection,
    name_match: NameMatch,
    venue_id: VenueId,
    violations: &mut Vec<InvariantViolation>,
) -> VenueRepoResult<()> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT name, event_count
             FROM venues
             WHERE uuid = ?1
               AND is_deleted = 0;",
            [venue_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((name, stored)) = row else {
        // Deleted venues carry no aggregate; their links are covered per event.
        return Ok(());
    };

    let linked: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM venue_links
         WHERE relation = ?1
           AND venue_uuid = ?2;",
        params![VENUE_TO_EVENT, venue_id.to_string()],
        |row| row.get(0),
    )?;
    if stored != linked {
        violations.push(InvariantViolation::CountMismatch {
            venue_id,
            stored: clamp_u32(stored),
            linked: clamp_u32(linked),
        });
    }

    let holders: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*)
             FROM venues
             WHERE is_deleted = 0
               AND name = ?1 COLLATE {};",
            name_match.collation()
        ),
        [name.as_str()],
        |row| row.get(0),
    )?;
    if holders > 1 {
        violations.push(InvariantViolation::DuplicateName {
            venue_id,
            holders: clamp_u32(holders),
        });
    }

    Ok(())
}

fn check_event(
    conn: &Connection,
    event_id: EventId,
    violations: &mut Vec<InvariantViolation>,
) -> VenueRepoResult<()> {
    let event_uuid = event_id.to_string();

    let mut stmt = conn.prepare(
        "SELECT l.venue_uuid, v.name, v.is_deleted
         FROM venue_links l
         LEFT JOIN venues v ON v.uuid = l.venue_uuid
         WHERE l.relation = ?1
           AND l.event_uuid = ?2;",
    )?;
    let mut rows = stmt.query(params![VENUE_TO_EVENT, event_uuid])?;
    let mut links: Vec<(VenueId, Option<String>)> = Vec::new();
    while let Some(row) = rows.next()? {
        let venue_text: String = row.get(0)?;
        let venue_id = parse_uuid(&venue_text, "venue_links.venue_uuid")?;
        let name: Option<String> = row.get(1)?;
        let is_deleted: Option<i64> = row.get(2)?;
        let live_name = match is_deleted {
            Some(0) => name,
            _ => None,
        };
        if live_name.is_none() {
            violations.push(InvariantViolation::DanglingLink { event_id, venue_id });
        }
        links.push((venue_id, live_name));
    }

    if links.len() > 1 {
        violations.push(InvariantViolation::MultipleLinks {
            event_id,
            links: u32::try_from(links.len()).unwrap_or(u32::MAX),
        });
        return Ok(());
    }

    let reference: Option<(Option<String>, String)> = conn
        .query_row(
            "SELECT venue_uuid, venue_name
             FROM event_refs
             WHERE event_uuid = ?1;",
            [event_uuid.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let consistent = match (links.first(), reference) {
        (None, None) => true,
        (None, Some((venue_uuid, venue_name))) => venue_uuid.is_none() && venue_name.is_empty(),
        (Some(_), None) => false,
        (Some((venue_id, live_name)), Some((venue_uuid, venue_name))) => {
            venue_uuid.as_deref() == Some(venue_id.to_string().as_str())
                && live_name.as_deref() == Some(venue_name.as_str())
        }
    };
    if !consistent {
        violations.push(InvariantViolation::StaleEventRef { event_id });
    }

    Ok(())
}

fn collect_ids(conn: &Connection, sql: &str, column: &'static str) -> VenueRepoResult<Vec<uuid::Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, column)?);
    }
    Ok(ids)
}

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
