//! Command-line surface of the venue directory.
//!
//! # Responsibility
//! - Declare global flags (database, logging, directory settings).
//! - Declare one subcommand per directory operation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "venuedir",
    about = "Venue directory: assign venues to events and keep counts consistent",
    version
)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, env = "VENUEDIR_DB", default_value = "venuedir.sqlite3")]
    pub db: PathBuf,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, env = "VENUEDIR_LOG_DIR")]
    pub log_dir: Option<String>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, env = "VENUEDIR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// JSON file with directory settings; flags below override its values
    #[arg(long, env = "VENUEDIR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Compare venue names ignoring ASCII case
    #[arg(long)]
    pub case_insensitive: bool,

    /// Busy timeout for the write lock, in milliseconds
    #[arg(long)]
    pub lock_timeout_ms: Option<u64>,

    /// Extra whole-operation attempts after the lock wait expires
    #[arg(long)]
    pub lock_retries: Option<u32>,

    /// Skip the post-mutation invariant check
    #[arg(long)]
    pub no_verify: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assign a venue to an event by name, creating the venue when needed
    Assign {
        /// Event id
        event: Uuid,

        /// Venue name; an empty name clears the event's venue
        venue: String,

        /// Timezone stored on a newly created venue
        #[arg(long)]
        timezone: Option<String>,

        /// City stored on a newly created venue
        #[arg(long)]
        city: Option<String>,
    },

    /// Point an event at a venue id, or clear it when no id is given
    Link {
        /// Event id
        event: Uuid,

        /// Venue id
        #[arg(long)]
        venue_id: Option<Uuid>,
    },

    /// Create a standalone venue
    Create {
        /// Venue name
        name: String,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        timezone: Option<String>,
    },

    /// Rename a venue
    Rename {
        /// Venue id
        venue_id: Uuid,

        /// New name; an empty name falls back to the venue id
        name: String,
    },

    /// Delete a venue and detach its events
    Delete {
        /// Venue id
        venue_id: Uuid,
    },

    /// Show one venue and its linked events
    Show {
        /// Venue id
        venue_id: Uuid,
    },

    /// Show the venue linked to an event
    Event {
        /// Event id
        event: Uuid,
    },

    /// List live venues ordered by name
    List {
        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Check every directory invariant
    Audit,
}
