//! Settings type definitions with compiled defaults.

use serde::{Deserialize, Serialize};

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    format!("{home}/.spreadr/spreadr.db")
}

fn default_pool_size() -> u32 {
    16
}

fn default_busy_timeout_ms() -> u32 {
    30_000
}

fn default_cache_size_kib() -> i64 {
    8192
}

fn default_config_cache_ttl_seconds() -> u64 {
    180
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level server settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadrSettings {
    /// Settings schema version.
    pub version: String,
    /// Database location and pool tuning.
    pub database: DatabaseSettings,
    /// Forest engine tuning.
    pub forest: ForestSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for SpreadrSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            database: DatabaseSettings::default(),
            forest: ForestSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// SQLite database settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the database file.
    pub path: String,
    /// Maximum connection pool size.
    pub pool_size: u32,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// SQLite page cache size in KiB.
    pub cache_size_kib: i64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            cache_size_kib: default_cache_size_kib(),
        }
    }
}

/// Forest engine settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestSettings {
    /// TTL, in seconds, for the cached experiment configuration. Shape
    /// targets tolerate minutes of staleness; lease fields never go through
    /// this cache.
    pub config_cache_ttl_seconds: u64,
}

impl Default for ForestSettings {
    fn default() -> Self {
        Self {
            config_cache_ttl_seconds: default_config_cache_ttl_seconds(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Minimum log level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
