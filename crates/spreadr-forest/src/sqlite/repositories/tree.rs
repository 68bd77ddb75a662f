//! Tree repository — tree rows, lock fields, and candidate listings.
//!
//! The lock fields (`profile_lock_id`, `profile_lock_heartbeat`) are plain
//! columns; all decisions about their meaning live in `crate::lease`. This
//! repository only reads and writes them, always inside the store's
//! serialized sections.

use rusqlite::{Connection, OptionalExtension, params};
use spreadr_core::{Bucket, Language, TreeId, OTHER_LANGUAGE};

use crate::errors::Result;
use crate::sqlite::row_types::{TreeLockStateRow, TreeRow};

/// Filters for candidate-tree listings.
///
/// These are the discovery filters the web layer forwards (root language and
/// bucket, participation history, mothertongue segregation); shape and lock
/// eligibility are applied afterwards by the selector.
#[derive(Default)]
pub struct TreeFilters<'a> {
    /// Only trees whose root sentence is in this language.
    pub root_language: Option<Language>,
    /// Only trees whose root sentence carries this bucket.
    pub root_bucket: Option<Bucket>,
    /// Exclude trees the given profile has already contributed to.
    pub untouched_by_profile: Option<&'a str>,
    /// `Some(true)`: only trees touched by an other-mothertongue profile;
    /// `Some(false)`: only trees untouched by any such profile.
    pub other_mothertongue: Option<bool>,
    /// Maximum results.
    pub limit: Option<i64>,
}

/// Tree repository — stateless, every method takes `&Connection`.
pub struct TreeRepo;

const TREE_COLUMNS: &str =
    "t.id, t.root_sentence_id, t.profile_lock_id, t.profile_lock_heartbeat, t.created_at";

impl TreeRepo {
    /// Create a new empty tree.
    pub fn create(conn: &Connection) -> Result<TreeRow> {
        let id = TreeId::new().into_inner();
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO trees (id, created_at) VALUES (?1, ?2)",
            params![id, now],
        )?;
        Ok(TreeRow {
            id,
            root_sentence_id: None,
            profile_lock_id: None,
            profile_lock_heartbeat: None,
            created_at: now,
        })
    }

    /// Get tree by ID.
    pub fn get_by_id(conn: &Connection, tree_id: &str) -> Result<Option<TreeRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {TREE_COLUMNS} FROM trees t WHERE t.id = ?1"),
                params![tree_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// List trees matching the given filters, oldest first.
    pub fn list(conn: &Connection, filters: &TreeFilters<'_>) -> Result<Vec<TreeRow>> {
        use std::fmt::Write;
        let mut sql = format!("SELECT {TREE_COLUMNS} FROM trees t");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if filters.root_language.is_some() || filters.root_bucket.is_some() {
            sql.push_str(" JOIN sentences r ON r.id = t.root_sentence_id");
        }
        sql.push_str(" WHERE 1=1");

        if let Some(language) = filters.root_language {
            let _ = write!(sql, " AND r.language = ?{}", param_values.len() + 1);
            param_values.push(Box::new(language.as_str().to_string()));
        }
        if let Some(bucket) = filters.root_bucket {
            let _ = write!(sql, " AND r.bucket = ?{}", param_values.len() + 1);
            param_values.push(Box::new(bucket.as_str().to_string()));
        }
        if let Some(profile_id) = filters.untouched_by_profile {
            let _ = write!(
                sql,
                " AND NOT EXISTS (SELECT 1 FROM sentences s \
                   WHERE s.tree_id = t.id AND s.profile_id = ?{})",
                param_values.len() + 1
            );
            param_values.push(Box::new(profile_id.to_string()));
        }
        if let Some(with_other) = filters.other_mothertongue {
            let op = if with_other { "EXISTS" } else { "NOT EXISTS" };
            let _ = write!(
                sql,
                " AND {op} (SELECT 1 FROM sentences s \
                   JOIN profiles p ON p.id = s.profile_id \
                   WHERE s.tree_id = t.id AND p.mothertongue = ?{})",
                param_values.len() + 1
            );
            param_values.push(Box::new(OTHER_LANGUAGE.as_str().to_string()));
        }

        sql.push_str(" ORDER BY t.created_at ASC, t.id ASC");
        if let Some(limit) = filters.limit {
            let _ = write!(sql, " LIMIT {limit}");
        }

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(Box::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Oldest tree with zero sentences, if any. Used by empty-tree recycling.
    pub fn first_empty(conn: &Connection) -> Result<Option<TreeRow>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {TREE_COLUMNS} FROM trees t \
                     WHERE NOT EXISTS (SELECT 1 FROM sentences s WHERE s.tree_id = t.id) \
                     ORDER BY t.created_at ASC, t.id ASC LIMIT 1"
                ),
                [],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Set the root sentence. Returns `false` if a root was already set
    /// (the root is write-once).
    pub fn set_root(conn: &Connection, tree_id: &str, sentence_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE trees SET root_sentence_id = ?1 \
             WHERE id = ?2 AND root_sentence_id IS NULL",
            params![sentence_id, tree_id],
        )?;
        Ok(changed > 0)
    }

    /// Set the lease holder and heartbeat in one write.
    pub fn set_lock(
        conn: &Connection,
        tree_id: &str,
        profile_id: &str,
        heartbeat_at: &str,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE trees SET profile_lock_id = ?1, profile_lock_heartbeat = ?2 WHERE id = ?3",
            params![profile_id, heartbeat_at, tree_id],
        )?;
        Ok(changed > 0)
    }

    /// Renew the heartbeat without changing the holder.
    pub fn touch_heartbeat(conn: &Connection, tree_id: &str, heartbeat_at: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE trees SET profile_lock_heartbeat = ?1 WHERE id = ?2",
            params![heartbeat_at, tree_id],
        )?;
        Ok(changed > 0)
    }

    /// Lock-relevant snapshot of one tree: holder, heartbeat, newest
    /// sentence timestamp, and sentence count, read in a single query.
    pub fn lock_state(conn: &Connection, tree_id: &str) -> Result<Option<TreeLockStateRow>> {
        let row = conn
            .query_row(
                "SELECT t.profile_lock_id, t.profile_lock_heartbeat,
                        (SELECT MAX(s.created_at) FROM sentences s WHERE s.tree_id = t.id),
                        (SELECT COUNT(*) FROM sentences s WHERE s.tree_id = t.id)
                 FROM trees t WHERE t.id = ?1",
                params![tree_id],
                |row| {
                    Ok(TreeLockStateRow {
                        profile_lock_id: row.get(0)?,
                        profile_lock_heartbeat: row.get(1)?,
                        newest_sentence_at: row.get(2)?,
                        sentence_count: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Total number of trees.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trees", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TreeRow> {
        Ok(TreeRow {
            id: row.get(0)?,
            root_sentence_id: row.get(1)?,
            profile_lock_id: row.get(2)?,
            profile_lock_heartbeat: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
