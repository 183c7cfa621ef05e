//! Directory runtime configuration.
//!
//! # Responsibility
//! - Hold the knobs that change directory behavior without code changes.
//! - Provide defaults that match the legacy venue directory.
//!
//! # Invariants
//! - Every field has a default, so partial config documents deserialize.
//! - `NameMatch::Exact` is the default comparison mode.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LOCK_RETRIES: u32 = 2;

/// How venue names are compared for lookup and uniqueness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatch {
    /// Byte-for-byte comparison, no normalization.
    #[default]
    Exact,
    /// ASCII case-insensitive comparison (SQLite `NOCASE`).
    CaseInsensitive,
}

impl NameMatch {
    /// SQLite collation implementing this comparison mode.
    pub fn collation(self) -> &'static str {
        match self {
            Self::Exact => "BINARY",
            Self::CaseInsensitive => "NOCASE",
        }
    }

    /// Compares two names in memory with the same rules as the collation.
    pub fn matches(self, left: &str, right: &str) -> bool {
        match self {
            Self::Exact => left == right,
            Self::CaseInsensitive => left.eq_ignore_ascii_case(right),
        }
    }
}

/// Settings for directory services and the connections they run on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Venue name comparison mode.
    pub name_match: NameMatch,
    /// Bounded wait for the write lock, applied as SQLite busy timeout.
    pub lock_timeout_ms: u64,
    /// Extra whole-operation attempts after the lock wait expires.
    pub lock_retries: u32,
    /// Re-check invariants for touched rows before each commit.
    pub verify_invariants: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            name_match: NameMatch::Exact,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            lock_retries: DEFAULT_LOCK_RETRIES,
            verify_invariants: true,
        }
    }
}

impl DirectoryConfig {
    /// Lock wait as a `Duration`.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Total attempts one mutation may make before reporting a lock timeout.
    pub fn max_attempts(&self) -> u32 {
        self.lock_retries.saturating_add(1)
    }
}
