//! Error types for the forest engine.
//!
//! [`ForestError`] is the primary error type returned by all forest
//! operations. Lock contention has two distinguishable variants so callers
//! can decide whether to retry with another tree immediately
//! ([`ForestError::LockConflict`]) or reselect from scratch
//! ([`ForestError::NotLockHolder`]). "No tree available" is not an error:
//! selection returns `Ok(None)` for that steady state.

use thiserror::Error;

/// Errors that can occur during forest operations.
#[derive(Debug, Error)]
pub enum ForestError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Experiment configuration failed validation.
    #[error(transparent)]
    Config(#[from] spreadr_core::ConfigError),

    /// Requested tree was not found.
    #[error("tree not found: {0}")]
    TreeNotFound(String),

    /// Requested sentence was not found.
    #[error("sentence not found: {0}")]
    SentenceNotFound(String),

    /// Requested profile was not found.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Another profile holds a valid lease on the tree. Recoverable: pick a
    /// different tree or wait for expiry.
    #[error("tree {tree_id} is locked by {holder}")]
    LockConflict {
        /// The contended tree.
        tree_id: String,
        /// The profile holding the valid lease.
        holder: String,
    },

    /// The caller is not the current valid lease holder. The caller must
    /// reselect a tree, not retry the heartbeat.
    #[error("profile {profile_id} does not hold the lease on tree {tree_id}")]
    NotLockHolder {
        /// The tree whose lease was heartbeated.
        tree_id: String,
        /// The profile that attempted the heartbeat.
        profile_id: String,
    },

    /// A tree's stored sentences do not form a valid rooted tree. Skipped
    /// during filter passes; surfaced directly by single-tree queries.
    #[error("tree {tree_id} is malformed: {reason}")]
    MalformedTree {
        /// The tree with inconsistent data.
        tree_id: String,
        /// What the consistency check found.
        reason: String,
    },

    /// The tree reached its configured capacity; no further growth.
    #[error("tree {0} is full")]
    TreeFull(String),

    /// A root append targeted a tree that already has a root.
    #[error("tree {0} already has a root")]
    RootAlreadySet(String),

    /// Invalid operation on the forest store.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Internal error (e.g. poisoned lock, unparseable stored timestamp).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for forest results.
pub type Result<T> = std::result::Result<T, ForestError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
