//! Pure lease-state predicates.
//!
//! A lease is a (holder, heartbeat) pair on a tree row. These predicates are
//! pure over a [`LeaseState`] snapshot so the store can evaluate them inside
//! its serialized write sections, and tests can probe the timing boundaries
//! without a clock.
//!
//! Freedom has three sources: no holder recorded, a heartbeat older than the
//! timeout, or a sentence created after the heartbeat. The last is the
//! implicit-release rule: a submission landing after the last renewal means
//! the session has moved past locking, so the tree is free for *new*
//! allocation even though the nominal timeout hasn't elapsed.

use chrono::{DateTime, Duration, Utc};

use crate::errors::{ForestError, Result};
use crate::sqlite::row_types::TreeLockStateRow;

/// Snapshot of the lock-relevant state of one tree.
#[derive(Clone, Debug)]
pub struct LeaseState {
    /// Profile currently (or last) recorded as holder.
    pub holder: Option<String>,
    /// Last lease renewal.
    pub heartbeat_at: Option<DateTime<Utc>>,
    /// Creation time of the tree's newest sentence.
    pub newest_sentence_at: Option<DateTime<Utc>>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ForestError::Internal(format!("unparseable stored timestamp {raw:?}: {e}")))
}

impl LeaseState {
    /// Parse a lock-state row into comparable timestamps.
    pub fn from_row(row: &TreeLockStateRow) -> Result<Self> {
        Ok(Self {
            holder: row.profile_lock_id.clone(),
            heartbeat_at: row
                .profile_lock_heartbeat
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            newest_sentence_at: row
                .newest_sentence_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }

    /// Whether the tree is free for new allocation at `now`.
    #[must_use]
    pub fn is_free(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let (Some(_), Some(heartbeat)) = (&self.holder, self.heartbeat_at) else {
            return true;
        };
        if now - heartbeat >= timeout {
            return true;
        }
        // Implicit release: work was already submitted after the renewal.
        self.newest_sentence_at.is_some_and(|newest| newest > heartbeat)
    }

    /// Whether `profile_id` holds a nominally valid lease at `now`.
    ///
    /// Ignores implicit release: an in-flight holder keeps its write
    /// privilege (and its heartbeat right) until the timeout lapses, even
    /// after a submission made the tree free for new allocation.
    #[must_use]
    pub fn is_held_by(&self, profile_id: &str, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.holder.as_deref() == Some(profile_id) && !self.nominally_expired(now, timeout)
    }

    /// Whether the lease lapsed by timeout alone.
    #[must_use]
    pub fn nominally_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        match self.heartbeat_at {
            Some(heartbeat) => now - heartbeat >= timeout,
            None => true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000 + seconds, 0).unwrap()
    }

    fn locked_at(heartbeat: i64) -> LeaseState {
        LeaseState {
            holder: Some("prof_a".into()),
            heartbeat_at: Some(at(heartbeat)),
            newest_sentence_at: None,
        }
    }

    #[test]
    fn never_locked_tree_is_free() {
        let lease = LeaseState {
            holder: None,
            heartbeat_at: None,
            newest_sentence_at: None,
        };
        assert!(lease.is_free(at(0), Duration::seconds(60)));
    }

    #[test]
    fn expiry_boundary() {
        let timeout = Duration::seconds(60);
        let lease = locked_at(0);
        assert!(!lease.is_free(at(59), timeout));
        assert!(lease.is_free(at(60), timeout), "validity requires now - hb < timeout");
        assert!(lease.is_free(at(61), timeout));
    }

    #[test]
    fn implicit_release_frees_before_expiry() {
        let mut lease = locked_at(0);
        lease.newest_sentence_at = Some(at(1));
        assert!(lease.is_free(at(2), Duration::seconds(60)));
    }

    #[test]
    fn sentence_older_than_heartbeat_does_not_release() {
        let mut lease = locked_at(10);
        lease.newest_sentence_at = Some(at(5));
        assert!(!lease.is_free(at(11), Duration::seconds(60)));
    }

    #[test]
    fn held_by_ignores_implicit_release() {
        let mut lease = locked_at(0);
        lease.newest_sentence_at = Some(at(1));
        let timeout = Duration::seconds(60);
        // Free for new allocation, but the holder is still the holder.
        assert!(lease.is_free(at(2), timeout));
        assert!(lease.is_held_by("prof_a", at(2), timeout));
        assert!(!lease.is_held_by("prof_b", at(2), timeout));
    }

    #[test]
    fn held_by_respects_expiry() {
        let lease = locked_at(0);
        let timeout = Duration::seconds(60);
        assert!(lease.is_held_by("prof_a", at(59), timeout));
        assert!(!lease.is_held_by("prof_a", at(60), timeout));
    }

    #[test]
    fn from_row_parses_rfc3339() {
        let row = TreeLockStateRow {
            profile_lock_id: Some("prof_a".into()),
            profile_lock_heartbeat: Some("2026-02-01T10:00:00+00:00".into()),
            newest_sentence_at: Some("2026-02-01T10:00:01Z".into()),
            sentence_count: 2,
        };
        let lease = LeaseState::from_row(&row).unwrap();
        assert!(lease.newest_sentence_at.unwrap() > lease.heartbeat_at.unwrap());
    }

    #[test]
    fn from_row_rejects_garbage_timestamp() {
        let row = TreeLockStateRow {
            profile_lock_id: Some("prof_a".into()),
            profile_lock_heartbeat: Some("yesterday-ish".into()),
            newest_sentence_at: None,
            sentence_count: 0,
        };
        let err = LeaseState::from_row(&row).unwrap_err();
        assert_matches!(err, ForestError::Internal(_));
    }
}
