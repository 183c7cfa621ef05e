//! Venue directory schema migrations.
//!
//! # Responsibility
//! - Register venue schema steps in strictly increasing order.
//! - Bring a connection up to the latest step inside one transaction.
//! - Confirm the directory tables exist once the stamped version says so.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - A database stamped at a known version but missing one of the tables that
//!   version introduced is rejected, never silently patched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    /// Tables this step creates; checked after every open.
    tables: &'static [&'static str],
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "venues",
        tables: &["venues", "venue_links"],
        sql: include_str!("0001_venues.sql"),
    },
    Migration {
        version: 2,
        name: "event_refs",
        tables: &["event_refs"],
        sql: include_str!("0002_event_refs.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Upgrades the venue schema on `conn` and verifies its tables.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer binary.
/// - `MissingTable` when a stamped version lacks one of its tables.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let stamped = current_user_version(conn)?;
    let latest = latest_version();
    if stamped > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stamped,
            latest_supported: latest,
        });
    }

    if stamped < latest {
        let tx = conn.transaction()?;
        for migration in pending(stamped) {
            tx.execute_batch(migration.sql)?;
            tx.pragma_update(None, "user_version", migration.version)?;
            info!(
                "event=db_migrate module=db status=ok version={} name={}",
                migration.version, migration.name
            );
        }
        tx.commit()?;
    }

    verify_tables(conn, latest)
}

/// Reads the schema version stamped on the connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn pending(stamped: u32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS
        .iter()
        .filter(move |migration| migration.version > stamped)
}

fn verify_tables(conn: &Connection, up_to: u32) -> DbResult<()> {
    let mut stmt = conn.prepare(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
    )?;
    for migration in MIGRATIONS.iter().filter(|m| m.version <= up_to) {
        for &table in migration.tables {
            let exists: i64 = stmt.query_row([table], |row| row.get(0))?;
            if exists != 1 {
                return Err(DbError::MissingTable {
                    table,
                    version: migration.version,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{pending, MIGRATIONS};
    use std::collections::HashSet;

    #[test]
    fn versions_are_strictly_increasing_from_one() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1);
        }
    }

    #[test]
    fn every_table_belongs_to_exactly_one_step() {
        let mut seen = HashSet::new();
        for migration in MIGRATIONS {
            assert!(!migration.tables.is_empty(), "{} creates no table", migration.name);
            for table in migration.tables {
                assert!(seen.insert(*table), "table {table} registered twice");
                assert!(
                    migration.sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table} ")),
                    "step {} does not create {table}",
                    migration.name
                );
            }
        }
    }

    #[test]
    fn pending_skips_applied_steps() {
        let names: Vec<&str> = pending(1).map(|migration| migration.name).collect();
        assert_eq!(names, vec!["event_refs"]);
        assert_eq!(pending(2).count(), 0);
    }
}
