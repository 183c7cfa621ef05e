//! SQLite storage bootstrap, schema migrations and write scopes.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the venue directory.
//! - Apply schema migrations in deterministic order.
//! - Provide the single write-scope helper every mutation path goes through.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Directory code must not read/write venue data before migrations succeed.
//! - A write scope never nests: inside an open transaction it joins it.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
mod scope;

pub use open::{open_db, open_db_in_memory, open_db_with_config};
pub use scope::{is_lock_contention, with_read_snapshot, with_write_tx};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Stamped schema version is known but one of its tables is absent.
    MissingTable {
        table: &'static str,
        version: u32,
    },
}

impl DbError {
    /// Returns whether this error reports a held write lock.
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Self::Sqlite(err) => is_lock_contention(err),
            Self::UnsupportedSchemaVersion { .. } | Self::MissingTable { .. } => false,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::MissingTable { table, version } => write!(
                f,
                "database is stamped at schema version {version} but table `{table}` is missing"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::MissingTable { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
