//! Venue repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/update/delete/lookup-by-name over `venues` storage.
//! - Run every name through unique-name resolution before it is stored.
//! - Own the only write path for the derived `event_count` column.
//!
//! # Invariants
//! - Live venue names are pairwise distinct under the configured `NameMatch`.
//! - Deleting a venue removes every link targeting it in the same write scope.
//! - Read paths never return soft-deleted venues.

use crate::config::NameMatch;
use crate::db::{with_write_tx, DbError};
use crate::model::venue::{EventId, NewVenue, Venue, VenueId, VenueProperties};
use crate::naming::{fallback_name, resolve_unique_name};
use crate::repo::link_repo::{SqliteLinkRepository, VenueLinkRepository};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const VENUE_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    address,
    city,
    state,
    postal_code,
    country,
    website,
    phone,
    contact_name,
    contact_phone,
    contact_email,
    notes,
    timezone,
    event_count,
    created_at,
    updated_at
FROM venues";

pub type VenueRepoResult<T> = Result<T, VenueRepoError>;

/// Error for venue and link persistence operations.
#[derive(Debug)]
pub enum VenueRepoError {
    Db(DbError),
    /// Venue does not exist or is soft-deleted.
    VenueNotFound(VenueId),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl VenueRepoError {
    /// Returns whether this error reports a held write lock.
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_lock_contention())
    }
}

impl Display for VenueRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::VenueNotFound(id) => write!(f, "venue not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted venue data: {message}"),
        }
    }
}

impl Error for VenueRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::VenueNotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for VenueRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for VenueRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing venues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VenueListQuery {
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for venue persistence.
pub trait VenueRepository {
    /// Loads one live venue.
    fn get_venue(&self, id: VenueId) -> VenueRepoResult<Option<Venue>>;
    /// Loads the live venue holding `name` under the configured comparison.
    fn find_by_name(&self, name: &str) -> VenueRepoResult<Option<Venue>>;
    /// Resolves `candidate` to a name no live venue other than `excluding` holds.
    fn resolve_unique_name(
        &self,
        candidate: &str,
        excluding: Option<VenueId>,
    ) -> VenueRepoResult<String>;
    /// Creates one venue, storing the count seed verbatim.
    fn create_venue(&self, new_venue: &NewVenue) -> VenueRepoResult<Venue>;
    /// Applies a partial property update.
    fn update_venue(&self, id: VenueId, patch: &VenueProperties) -> VenueRepoResult<Venue>;
    /// Soft-deletes one venue and detaches its events.
    fn delete_venue(&self, id: VenueId) -> VenueRepoResult<Vec<EventId>>;
    /// Lists live venues ordered by name.
    fn list_venues(&self, query: &VenueListQuery) -> VenueRepoResult<Vec<Venue>>;
    /// Writes the derived event count. Returns `false` when the venue is not live.
    fn write_event_count(&self, id: VenueId, count: u32) -> VenueRepoResult<bool>;
}

/// SQLite-backed venue repository.
pub struct SqliteVenueRepository<'conn> {
    conn: &'conn Connection,
    name_match: NameMatch,
}

impl<'conn> SqliteVenueRepository<'conn> {
    pub fn new(conn: &'conn Connection, name_match: NameMatch) -> Self {
        Self { conn, name_match }
    }

    fn name_taken(&self, name: &str, excluding: Option<VenueId>) -> VenueRepoResult<bool> {
        let sql = format!(
            "SELECT EXISTS(
                SELECT 1
                FROM venues
                WHERE is_deleted = 0
                  AND name = ?1 COLLATE {}
                  AND (?2 IS NULL OR uuid != ?2)
            );",
            self.name_match.collation()
        );
        let taken: i64 = self.conn.query_row(
            &sql,
            params![name, excluding.map(|id| id.to_string())],
            |row| row.get(0),
        )?;
        Ok(taken == 1)
    }
}

impl VenueRepository for SqliteVenueRepository<'_> {
    fn get_venue(&self, id: VenueId) -> VenueRepoResult<Option<Venue>> {
        load_live_venue(self.conn, id)
    }

    fn find_by_name(&self, name: &str) -> VenueRepoResult<Option<Venue>> {
        let sql = format!(
            "{VENUE_SELECT_SQL}
             WHERE is_deleted = 0
               AND name = ?1 COLLATE {}
             ORDER BY created_at ASC, uuid ASC
             LIMIT 1;",
            self.name_match.collation()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_venue_row(row)?));
        }
        Ok(None)
    }

    fn resolve_unique_name(
        &self,
        candidate: &str,
        excluding: Option<VenueId>,
    ) -> VenueRepoResult<String> {
        resolve_unique_name(candidate, |name| self.name_taken(name, excluding))
    }

    fn create_venue(&self, new_venue: &NewVenue) -> VenueRepoResult<Venue> {
        let id = Uuid::new_v4();
        let requested = new_venue
            .properties
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| fallback_name(id), str::to_string);

        let mut venue = empty_venue(id);
        new_venue.properties.apply_attributes(&mut venue);
        venue.event_count = new_venue.seed_event_count.unwrap_or(0);

        with_write_tx(self.conn, |conn| {
            venue.name = self.resolve_unique_name(&requested, None)?;
            conn.execute(
                "INSERT INTO venues (
                    uuid,
                    name,
                    address,
                    city,
                    state,
                    postal_code,
                    country,
                    website,
                    phone,
                    contact_name,
                    contact_phone,
                    contact_email,
                    notes,
                    timezone,
                    event_count,
                    is_deleted
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 0);",
                params![
                    venue.id.to_string(),
                    venue.name,
                    venue.address,
                    venue.city,
                    venue.state,
                    venue.postal_code,
                    venue.country,
                    venue.website,
                    venue.phone,
                    venue.contact_name,
                    venue.contact_phone,
                    venue.contact_email,
                    venue.notes,
                    venue.timezone,
                    i64::from(venue.event_count),
                ],
            )?;
            load_required_venue(conn, id)
        })
    }

    fn update_venue(&self, id: VenueId, patch: &VenueProperties) -> VenueRepoResult<Venue> {
        with_write_tx(self.conn, |conn| {
            let current = load_required_venue(conn, id)?;
            let mut venue = current.clone();
            patch.apply_attributes(&mut venue);

            if let Some(name) = patch.name.as_deref().map(str::trim) {
                if name.is_empty() {
                    venue.name = self.resolve_unique_name(&fallback_name(id), Some(id))?;
                } else if name != current.name {
                    venue.name = self.resolve_unique_name(name, Some(id))?;
                }
            }

            conn.execute(
                "UPDATE venues
                 SET
                    name = ?2,
                    address = ?3,
                    city = ?4,
                    state = ?5,
                    postal_code = ?6,
                    country = ?7,
                    website = ?8,
                    phone = ?9,
                    contact_name = ?10,
                    contact_phone = ?11,
                    contact_email = ?12,
                    notes = ?13,
                    timezone = ?14,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                   AND is_deleted = 0;",
                params![
                    id.to_string(),
                    venue.name,
                    venue.address,
                    venue.city,
                    venue.state,
                    venue.postal_code,
                    venue.country,
                    venue.website,
                    venue.phone,
                    venue.contact_name,
                    venue.contact_phone,
                    venue.contact_email,
                    venue.notes,
                    venue.timezone,
                ],
            )?;

            if venue.name != current.name {
                SqliteLinkRepository::new(conn).refresh_venue_name(id, &venue.name)?;
            }

            load_required_venue(conn, id)
        })
    }

    fn delete_venue(&self, id: VenueId) -> VenueRepoResult<Vec<EventId>> {
        with_write_tx(self.conn, |conn| {
            load_required_venue(conn, id)?;
            let detached = SqliteLinkRepository::new(conn).detach_venue(id)?;

            conn.execute(
                "UPDATE venues
                 SET
                    is_deleted = 1,
                    event_count = 0,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                   AND is_deleted = 0;",
                [id.to_string()],
            )?;
            Ok(detached)
        })
    }

    fn list_venues(&self, query: &VenueListQuery) -> VenueRepoResult<Vec<Venue>> {
        let mut sql = format!("{VENUE_SELECT_SQL} WHERE is_deleted = 0 ORDER BY name ASC, uuid ASC");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut venues = Vec::new();
        while let Some(row) = rows.next()? {
            venues.push(parse_venue_row(row)?);
        }
        Ok(venues)
    }

    fn write_event_count(&self, id: VenueId, count: u32) -> VenueRepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE venues
             SET event_count = ?2
             WHERE uuid = ?1
               AND is_deleted = 0;",
            params![id.to_string(), i64::from(count)],
        )?;
        Ok(changed == 1)
    }
}

/// Returns the live name of `id`, if the venue exists.
pub(crate) fn live_venue_name(conn: &Connection, id: VenueId) -> VenueRepoResult<Option<String>> {
    let name = conn
        .query_row(
            "SELECT name
             FROM venues
             WHERE uuid = ?1
               AND is_deleted = 0;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name)
}

fn load_live_venue(conn: &Connection, id: VenueId) -> VenueRepoResult<Option<Venue>> {
    let mut stmt = conn.prepare(&format!(
        "{VENUE_SELECT_SQL}
         WHERE uuid = ?1
           AND is_deleted = 0;"
    ))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_venue_row(row)?));
    }
    Ok(None)
}

fn load_required_venue(conn: &Connection, id: VenueId) -> VenueRepoResult<Venue> {
    load_live_venue(conn, id)?.ok_or(VenueRepoError::VenueNotFound(id))
}

fn empty_venue(id: VenueId) -> Venue {
    Venue {
        id,
        name: String::new(),
        address: String::new(),
        city: String::new(),
        state: String::new(),
        postal_code: String::new(),
        country: String::new(),
        website: String::new(),
        phone: String::new(),
        contact_name: String::new(),
        contact_phone: String::new(),
        contact_email: String::new(),
        notes: String::new(),
        timezone: String::new(),
        event_count: 0,
        created_at: 0,
        updated_at: 0,
    }
}

fn parse_venue_row(row: &Row<'_>) -> VenueRepoResult<Venue> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "venues.uuid")?;

    let raw_count: i64 = row.get("event_count")?;
    let event_count = u32::try_from(raw_count).map_err(|_| {
        VenueRepoError::InvalidData(format!(
            "invalid event_count value `{raw_count}` in venues.event_count"
        ))
    })?;

    Ok(Venue {
        id,
        name: row.get("name")?,
        address: row.get("address")?,
        city: row.get("city")?,
        state: row.get("state")?,
        postal_code: row.get("postal_code")?,
        country: row.get("country")?,
        website: row.get("website")?,
        phone: row.get("phone")?,
        contact_name: row.get("contact_name")?,
        contact_phone: row.get("contact_phone")?,
        contact_email: row.get("contact_email")?,
        notes: row.get("notes")?,
        timezone: row.get("timezone")?,
        event_count,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> VenueRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| VenueRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
