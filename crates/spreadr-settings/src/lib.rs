//! # spreadr-settings
//!
//! Server-level settings with layered sources for the spreadr platform.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`SpreadrSettings::default()`]
//! 2. **User file** — `~/.spreadr/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `SPREADR_*` overrides (highest priority)
//!
//! These are *server* settings (database location, pool sizing, cache TTLs).
//! The admin-edited experiment configuration lives in the database and is
//! owned by `spreadr-forest`.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{DatabaseSettings, ForestSettings, LoggingSettings, SpreadrSettings};

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`]. The settings are loaded
/// from `~/.spreadr/settings.json` with env var overrides, or fall back to
/// compiled defaults if loading fails.
static SETTINGS: OnceLock<SpreadrSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.spreadr/settings.json` with env var
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, returns compiled defaults.
pub fn get_settings() -> &'static SpreadrSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: SpreadrSettings) -> std::result::Result<(), SpreadrSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
