//! Runtime configuration for store and logging bootstrap.
//!
//! Configuration is explicit: callers either build a [`CoreConfig`] by hand
//! or load one from `MEMBERDB_*` environment variables.

use crate::logging::{default_log_level, LogConfig, LoggingError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "MEMBERDB_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "MEMBERDB_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "MEMBERDB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "MEMBERDB_LOG_DIR";

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const IN_MEMORY_MARKER: &str = ":memory:";

/// Where the member store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    InvalidBusyTimeout(String),
    Logging(LoggingError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBusyTimeout(value) => write!(
                f,
                "{ENV_BUSY_TIMEOUT_MS} must be a non-negative integer, got `{value}`"
            ),
            Self::Logging(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidBusyTimeout(_) => None,
            Self::Logging(err) => Some(err),
        }
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

/// Store and logging settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub database: DatabaseLocation,
    pub busy_timeout: Duration,
    /// `None` leaves logging uninitialized.
    pub log: Option<LogConfig>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            log: None,
        }
    }
}

impl CoreConfig {
    /// File-backed configuration with default timeout and no logging.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseLocation::File(path.into()),
            ..Self::default()
        }
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// - Missing or `:memory:` database path selects an in-memory store.
    /// - Logging is enabled only when a log directory is present.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = match lookup(ENV_DB_PATH).map(|value| value.trim().to_string()) {
            None => DatabaseLocation::Memory,
            Some(path) if path.is_empty() || path == IN_MEMORY_MARKER => DatabaseLocation::Memory,
            Some(path) => DatabaseLocation::File(PathBuf::from(path)),
        };

        let busy_timeout = match lookup(ENV_BUSY_TIMEOUT_MS) {
            None => DEFAULT_BUSY_TIMEOUT,
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidBusyTimeout(raw.clone()))?,
        };

        let log = match lookup(ENV_LOG_DIR) {
            Some(dir) if !dir.trim().is_empty() => {
                let level = lookup(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string());
                Some(LogConfig::new(&level, &dir)?)
            }
            _ => None,
        };

        Ok(Self {
            database,
            busy_timeout,
            log,
        })
    }
}
