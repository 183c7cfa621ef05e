//! Directory settings resolution for the CLI.
//!
//! # Responsibility
//! - Load `DirectoryConfig` from an optional JSON file.
//! - Layer command-line overrides on top of the file values.
//!
//! # Invariants
//! - Fields missing from the file keep their library defaults.
//! - A flag that is not given never overwrites a file value.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use venuedir_core::{DirectoryConfig, NameMatch};

/// Command-line values that override the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub case_insensitive: bool,
    pub lock_timeout_ms: Option<u64>,
    pub lock_retries: Option<u32>,
    pub no_verify: bool,
}

#[derive(Debug)]
pub enum SettingsError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Reads the config file (if any) and applies `overrides`.
pub fn resolve(path: Option<&Path>, overrides: &Overrides) -> Result<DirectoryConfig, SettingsError> {
    let base = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            parse(&text).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
        None => DirectoryConfig::default(),
    };
    Ok(apply(base, overrides))
}

fn parse(text: &str) -> Result<DirectoryConfig, serde_json::Error> {
    serde_json::from_str(text)
}

fn apply(mut config: DirectoryConfig, overrides: &Overrides) -> DirectoryConfig {
    if overrides.case_insensitive {
        config.name_match = NameMatch::CaseInsensitive;
    }
    if let Some(timeout) = overrides.lock_timeout_ms {
        config.lock_timeout_ms = timeout;
    }
    if let Some(retries) = overrides.lock_retries {
        config.lock_retries = retries;
    }
    if overrides.no_verify {
        config.verify_invariants = false;
    }
    config
}
