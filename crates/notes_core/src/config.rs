//! Store configuration.
//!
//! # Responsibility
//! - Describe where notes are persisted and how long idle feed state lives.
//! - Resolve overrides from process environment variables.
//!
//! # Invariants
//! - `db_path = None` means an in-memory database.
//! - Blank environment values are treated as unset.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the SQLite file.
pub const DB_PATH_ENV: &str = "NOTES_DB_PATH";
/// Environment variable overriding the idle grace window, in milliseconds.
pub const IDLE_GRACE_ENV: &str = "NOTES_IDLE_GRACE_MS";
/// How long the feed keeps its last snapshot after the last subscriber leaves.
pub const DEFAULT_IDLE_GRACE: Duration = Duration::from_millis(5_000);

/// Invalid configuration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for {key}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Settings used by [`crate::NoteStore::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// SQLite file location; `None` keeps notes in memory.
    pub db_path: Option<PathBuf>,
    /// Retention of the cached snapshot once no subscriber is attached.
    pub idle_grace: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            db_path: None,
            idle_grace: DEFAULT_IDLE_GRACE,
        }
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            db_path: Some(path.as_ref().to_path_buf()),
            idle_grace: DEFAULT_IDLE_GRACE,
        }
    }

    pub fn with_idle_grace(mut self, idle_grace: Duration) -> Self {
        self.idle_grace = idle_grace;
        self
    }

    /// Builds a config from `NOTES_DB_PATH` and `NOTES_IDLE_GRACE_MS`.
    ///
    /// # Errors
    /// - Returns `InvalidValue` when the grace window is not a non-negative integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::in_memory();

        if let Some(raw) = lookup(DB_PATH_ENV) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                config.db_path = Some(PathBuf::from(trimmed));
            }
        }

        if let Some(raw) = lookup(IDLE_GRACE_ENV) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                let millis = trimmed
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: IDLE_GRACE_ENV,
                        value: trimmed.to_string(),
                    })?;
                config.idle_grace = Duration::from_millis(millis);
            }
        }

        Ok(config)
    }
}
