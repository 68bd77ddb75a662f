//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw database row shape — not the public API types.
//! Timestamps are RFC 3339 strings exactly as stored; parsing into
//! `chrono` types happens at the layer that needs to compare them
//! (see `crate::lease`).

use serde::{Deserialize, Serialize};

/// Raw profile row from the `profiles` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Profile ID.
    pub id: String,
    /// Mothertongue language code.
    pub mothertongue: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw tree row from the `trees` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeRow {
    /// Tree ID.
    pub id: String,
    /// Root sentence ID; null while the tree is empty.
    pub root_sentence_id: Option<String>,
    /// Profile currently (or last) holding the lease; never cleared.
    pub profile_lock_id: Option<String>,
    /// Timestamp of the last lease renewal; staleness, not nullness,
    /// defines lock validity.
    pub profile_lock_heartbeat: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw sentence row from the `sentences` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SentenceRow {
    /// Sentence ID.
    pub id: String,
    /// Owning tree ID.
    pub tree_id: String,
    /// Authoring profile ID.
    pub profile_id: String,
    /// Parent sentence ID; null only for the tree root.
    pub parent_id: Option<String>,
    /// Sentence text.
    pub text: String,
    /// Language code.
    pub language: String,
    /// Bucket tag.
    pub bucket: String,
    /// Proportion of the allotted read time used, in [0, 1].
    pub read_time_proportion: f64,
    /// Proportion of the allotted write time used, in [0, 1].
    pub write_time_proportion: f64,
    /// Seconds allotted for the read phase.
    pub read_time_allotted: f64,
    /// Seconds allotted for the write phase.
    pub write_time_allotted: f64,
    /// Creation timestamp (immutable).
    pub created_at: String,
}

/// Lock-relevant snapshot of one tree, read in a single query.
///
/// `newest_sentence_at` feeds the implicit-release rule: a sentence created
/// after the last heartbeat means the lease no longer blocks new allocation.
#[derive(Clone, Debug)]
pub struct TreeLockStateRow {
    /// Profile currently (or last) holding the lease.
    pub profile_lock_id: Option<String>,
    /// Timestamp of the last lease renewal.
    pub profile_lock_heartbeat: Option<String>,
    /// Creation timestamp of the tree's newest sentence.
    pub newest_sentence_at: Option<String>,
    /// Number of sentences in the tree.
    pub sentence_count: i64,
}
