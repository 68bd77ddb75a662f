//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SpreadrSettings::default()`]
//! 2. If `~/.spreadr/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::SpreadrSettings;

/// Resolve the path to the settings file (`~/.spreadr/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".spreadr").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SpreadrSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<SpreadrSettings> {
    let defaults = serde_json::to_value(SpreadrSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SpreadrSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
#[must_use]
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                if source_value.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_value) => deep_merge(target_value, source_value),
                    None => source_value,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (target, Value::Null) => target,
        (_, source) => source,
    }
}

/// Apply `SPREADR_*` environment variable overrides.
///
/// Recognized variables:
/// - `SPREADR_DB_PATH` — database file path
/// - `SPREADR_DB_POOL_SIZE` — connection pool size
/// - `SPREADR_CONFIG_CACHE_TTL_SECONDS` — experiment config cache TTL
/// - `SPREADR_LOG_LEVEL` — minimum log level
fn apply_env_overrides(settings: &mut SpreadrSettings) {
    if let Ok(path) = std::env::var("SPREADR_DB_PATH") {
        settings.database.path = path;
    }
    if let Ok(raw) = std::env::var("SPREADR_DB_POOL_SIZE") {
        match raw.parse::<u32>() {
            Ok(size) if size > 0 => settings.database.pool_size = size,
            _ => warn!(%raw, "ignoring invalid SPREADR_DB_POOL_SIZE"),
        }
    }
    if let Ok(raw) = std::env::var("SPREADR_CONFIG_CACHE_TTL_SECONDS") {
        match raw.parse::<u64>() {
            Ok(ttl) => settings.forest.config_cache_ttl_seconds = ttl,
            Err(_) => warn!(%raw, "ignoring invalid SPREADR_CONFIG_CACHE_TTL_SECONDS"),
        }
    }
    if let Ok(level) = std::env::var("SPREADR_LOG_LEVEL") {
        settings.logging.level = level;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.database.pool_size, 16);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"database": {"pool_size": 2}, "logging": {"level": "debug"}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.database.pool_size, 2);
        assert_eq!(settings.logging.level, "debug");
        // Untouched keys keep their defaults
        assert_eq!(settings.database.busy_timeout_ms, 30_000);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_settings_from_path(&path).is_err());
    }

    #[test]
    fn deep_merge_recurses_into_objects() {
        let target = serde_json::json!({"a": {"x": 1, "y": 2}, "b": 3});
        let source = serde_json::json!({"a": {"y": 20}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"]["x"], 1);
        assert_eq!(merged["a"]["y"], 20);
        assert_eq!(merged["b"], 3);
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let target = serde_json::json!({"xs": [1, 2, 3]});
        let source = serde_json::json!({"xs": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["xs"], serde_json::json!([9]));
    }

    #[test]
    fn deep_merge_skips_nulls() {
        let target = serde_json::json!({"keep": "me"});
        let source = serde_json::json!({"keep": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["keep"], "me");
    }
}
