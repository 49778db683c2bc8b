//! # Ledger Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_DB_PATH=/var/lib/tally/tally.db                              │
//! │     TALLY_DB_MAX_CONNECTIONS=8                                         │
//! │     TALLY_MAX_CONFLICT_RETRIES=3                                       │
//! │     TALLY_LOG=debug                                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally-ledger/ledger.toml (Linux)                         │
//! │     ~/Library/Application Support/com.tally.ledger/ledger.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/tally/tally.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [ledger]
//! max_conflict_retries = 5
//! retry_initial_backoff_ms = 20
//! retry_max_backoff_ms = 1000
//!
//! [logging]
//! filter = "info,tally=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use tally_db::DbConfig;

/// Upper bound for `max_conflict_retries`.
pub const MAX_CONFLICT_RETRIES_LIMIT: u32 = 20;

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `:memory:` gives a throwaway database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long SQLite waits on a lock before reporting busy.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "tally", "ledger")
        .map(|dirs| dirs.data_dir().join("tally.db"))
        .unwrap_or_else(|| PathBuf::from("tally.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DatabaseSettings {
    /// Pool configuration for [`tally_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        if self.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory();
        }
        DbConfig::new(&self.path)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// Retry behaviour for units of work that hit a write conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Extra attempts after the first. 0 disables retry.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub retry_initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub retry_max_backoff_ms: u64,
}

fn default_max_conflict_retries() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    20
}
fn default_max_backoff() -> u64 {
    1_000
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            max_conflict_retries: default_max_conflict_retries(),
            retry_initial_backoff_ms: default_initial_backoff(),
            retry_max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directives. `RUST_LOG` still wins when set.
    #[serde(default)]
    pub filter: Option<String>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`ledger.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Checks limits that would make the ledger misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }

        if self.ledger.max_conflict_retries > MAX_CONFLICT_RETRIES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "ledger.max_conflict_retries must be at most {MAX_CONFLICT_RETRIES_LIMIT}"
            )));
        }

        if self.ledger.retry_initial_backoff_ms > self.ledger.retry_max_backoff_ms {
            return Err(ConfigError::Invalid(
                "ledger.retry_initial_backoff_ms must not exceed retry_max_backoff_ms".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `TALLY_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("TALLY_DB_MAX_CONNECTIONS") {
            match value.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %value, "Ignoring invalid TALLY_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(value) = lookup("TALLY_MAX_CONFLICT_RETRIES") {
            match value.parse::<u32>() {
                Ok(retries) => self.ledger.max_conflict_retries = retries,
                Err(_) => warn!(value = %value, "Ignoring invalid TALLY_MAX_CONFLICT_RETRIES"),
            }
        }

        if let Some(filter) = lookup("TALLY_LOG") {
            self.logging.filter = Some(filter);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "ledger")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }
}
