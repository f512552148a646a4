//! # Store Configuration
//!
//! Which backend to use and how to reach it.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DOCREPO_BACKEND=memory                                             │
//! │     DOCREPO_DB_PATH=/var/lib/docrepo/docs.db                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/docrepo/config.toml (Linux)                              │
//! │     ~/Library/Application Support/dev.docrepo.docrepo/config.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     SQLite in the platform data directory                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! backend = "sqlite"  # sqlite | memory
//!
//! [database]
//! path = "/var/lib/docrepo/docs.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [logging]
//! filter = "info,docrepo=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::{DbConfig, DEFAULT_BUSY_TIMEOUT};

pub use crate::pool::IN_MEMORY_PATH;

// =============================================================================
// Backend
// =============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Process-local collections, lost on exit.
    Memory,

    /// The SQLite `documents` table.
    #[default]
    Sqlite,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Memory => write!(f, "memory"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Backend::Memory),
            "sqlite" | "sqlite3" => Ok(Backend::Sqlite),
            other => Err(DbError::InvalidConfig(format!(
                "Unknown backend: '{}'. Valid options: memory, sqlite",
                other
            ))),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// SQLite pool and driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply embedded migrations on connect.
    #[serde(default = "default_true")]
    pub run_migrations: bool,

    /// Seconds a writer waits for the database lock before failing.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "docrepo", "docrepo")
        .map(|dirs| dirs.data_dir().join("docrepo.db"))
        .unwrap_or_else(|| PathBuf::from("docrepo.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout() -> u64 {
    DEFAULT_BUSY_TIMEOUT.as_secs()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            run_migrations: true,
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

impl DatabaseSettings {
    /// Returns true if `path` selects an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }

    /// Builds the pool configuration these settings describe.
    pub fn to_db_config(&self) -> DbConfig {
        let base = if self.is_in_memory() {
            DbConfig::in_memory()
        } else {
            DbConfig::new(self.path.clone())
                .max_connections(self.max_connections)
                .min_connections(self.min_connections)
        };

        base.connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .run_migrations(self.run_migrations)
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs))
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

/// Default `tracing` filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info,docrepo=debug,sqlx=warn";

/// Logging settings used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// Complete store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl StoreConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, else the platform default)
    /// 3. `DOCREPO_*` environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`StoreConfig::load`], reading overrides through `lookup`
    /// instead of the process environment.
    pub fn load_with<F>(config_path: Option<PathBuf>, lookup: F) -> DbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading store config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(lookup);
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load store config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        let db = &self.database;

        if self.backend == Backend::Sqlite && db.path.as_os_str().is_empty() {
            return Err(DbError::InvalidConfig("database.path must not be empty".into()));
        }

        if db.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if db.min_connections > db.max_connections {
            return Err(DbError::InvalidConfig(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }

        if db.busy_timeout_secs == 0 {
            return Err(DbError::InvalidConfig(
                "database.busy_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `DOCREPO_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("DOCREPO_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding backend from environment");
                    self.backend = parsed;
                }
                Err(_) => warn!(backend = %backend, "Unknown backend in environment"),
            }
        }

        if let Some(path) = lookup("DOCREPO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("DOCREPO_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Invalid DOCREPO_MAX_CONNECTIONS"),
            }
        }

        if let Some(secs) = lookup("DOCREPO_BUSY_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(n) => self.database.busy_timeout_secs = n,
                Err(_) => warn!(value = %secs, "Invalid DOCREPO_BUSY_TIMEOUT_SECS"),
            }
        }

        if let Some(filter) = lookup("DOCREPO_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "docrepo", "docrepo")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
