//! The experiment configuration value object.
//!
//! A single admin-edited configuration record governs forest shaping (target
//! branch count and depth), lease timing (heartbeat period and margin), and
//! per-sentence time allotment (read/write factors). The record is persisted
//! by `spreadr-forest` as a singleton row; this type is the immutable value
//! handed out per call.
//!
//! Shaping reads may be minutes-stale (the store fronts them with a TTL
//! cache), so nothing here assumes instantaneous consistency across requests.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failure for a configuration value.
#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Shaping, timing, and allotment parameters for the experiment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Desired number of branches per tree.
    pub target_branch_count: u32,
    /// Desired depth (in edges from the root) of each branch.
    pub target_branch_depth: u32,
    /// Policy weight for starting a new branch vs. extending one. Consumed
    /// by selection heuristics outside this core; recorded here as policy
    /// input.
    pub branch_probability: f64,
    /// Period, in seconds, at which clients renew their tree lease.
    pub heartbeat_seconds: u32,
    /// Safety margin, in seconds, added to the renewal period before a lease
    /// is considered stale.
    pub heartbeat_margin_seconds: u32,
    /// Seconds per token allotted for reading a sentence.
    pub read_factor: f64,
    /// Seconds per token allotted for writing a reformulation.
    pub write_factor: f64,
    /// Floor on the token count used for time allotment.
    pub min_tokens: u32,
    /// Enforced pause, in seconds, between successive trials.
    pub pause_period_seconds: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            target_branch_count: 6,
            target_branch_depth: 8,
            branch_probability: 0.8,
            heartbeat_seconds: 10,
            heartbeat_margin_seconds: 5,
            read_factor: 1.0,
            write_factor: 5.0,
            min_tokens: 10,
            pause_period_seconds: 30,
        }
    }
}

impl Configuration {
    /// Validate all fields, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_branch_count < 1 {
            return Err(ConfigError("target_branch_count must be >= 1".into()));
        }
        if self.target_branch_depth < 2 {
            return Err(ConfigError("target_branch_depth must be >= 2".into()));
        }
        if !(0.1..=1.0).contains(&self.branch_probability) {
            return Err(ConfigError(
                "branch_probability must be in [0.1, 1.0]".into(),
            ));
        }
        if self.heartbeat_seconds == 0 {
            return Err(ConfigError("heartbeat_seconds must be > 0".into()));
        }
        if self.read_factor <= 0.0 || !self.read_factor.is_finite() {
            return Err(ConfigError("read_factor must be a positive number".into()));
        }
        if self.write_factor <= 0.0 || !self.write_factor.is_finite() {
            return Err(ConfigError("write_factor must be a positive number".into()));
        }
        if self.min_tokens < 1 {
            return Err(ConfigError("min_tokens must be >= 1".into()));
        }
        Ok(())
    }

    /// Effective lease timeout: heartbeat period plus safety margin.
    ///
    /// A lease is valid while `now - profile_lock_heartbeat < lease_timeout`.
    #[must_use]
    pub fn lease_timeout(&self) -> Duration {
        Duration::seconds(i64::from(self.heartbeat_seconds) + i64::from(self.heartbeat_margin_seconds))
    }

    /// Sentence count at which a tree is full:
    /// `target_branch_count * target_branch_depth + 1` (the root).
    #[must_use]
    pub fn full_tree_size(&self) -> u64 {
        u64::from(self.target_branch_count) * u64::from(self.target_branch_depth) + 1
    }

    /// Token count of a text for allotment purposes: whitespace-delimited
    /// words, floored at `min_tokens`.
    #[must_use]
    pub fn token_count(&self, text: &str) -> u32 {
        let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
        words.max(self.min_tokens)
    }

    /// Seconds allotted for reading `text`.
    #[must_use]
    pub fn read_time_allotted(&self, text: &str) -> f64 {
        self.read_factor * f64::from(self.token_count(text))
    }

    /// Seconds allotted for writing a reformulation of `text`.
    #[must_use]
    pub fn write_time_allotted(&self, text: &str) -> f64 {
        self.write_factor * f64::from(self.token_count(text))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
