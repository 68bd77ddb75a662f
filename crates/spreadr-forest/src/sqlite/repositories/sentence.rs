//! Sentence repository — append-only tree nodes.
//!
//! Sentences are never updated or deleted in normal operation; the only
//! write is the insert. Structural validity (parent in the same tree, lock
//! checks, fullness) is enforced by the store, not here.

use rusqlite::{Connection, OptionalExtension, params};
use spreadr_core::{Bucket, Language, SentenceId};

use crate::errors::Result;
use crate::sqlite::row_types::SentenceRow;

/// Options for creating a new sentence.
pub struct CreateSentenceOptions<'a> {
    /// Owning tree.
    pub tree_id: &'a str,
    /// Authoring profile.
    pub profile_id: &'a str,
    /// Parent sentence; `None` only for a tree root.
    pub parent_id: Option<&'a str>,
    /// Sentence text.
    pub text: &'a str,
    /// Language code.
    pub language: Language,
    /// Bucket tag.
    pub bucket: Bucket,
    /// Proportion of allotted read time used, in [0, 1].
    pub read_time_proportion: f64,
    /// Proportion of allotted write time used, in [0, 1].
    pub write_time_proportion: f64,
    /// Seconds allotted for the read phase.
    pub read_time_allotted: f64,
    /// Seconds allotted for the write phase.
    pub write_time_allotted: f64,
}

/// Sentence repository — stateless, every method takes `&Connection`.
pub struct SentenceRepo;

const SENTENCE_COLUMNS: &str = "id, tree_id, profile_id, parent_id, text, language, bucket, \
     read_time_proportion, write_time_proportion, read_time_allotted, write_time_allotted, \
     created_at";

impl SentenceRepo {
    /// Insert a new sentence.
    pub fn create(conn: &Connection, opts: &CreateSentenceOptions<'_>) -> Result<SentenceRow> {
        let id = SentenceId::new().into_inner();
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO sentences (id, tree_id, profile_id, parent_id, text, language, bucket,
             read_time_proportion, write_time_proportion, read_time_allotted, write_time_allotted,
             created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                opts.tree_id,
                opts.profile_id,
                opts.parent_id,
                opts.text,
                opts.language.as_str(),
                opts.bucket.as_str(),
                opts.read_time_proportion,
                opts.write_time_proportion,
                opts.read_time_allotted,
                opts.write_time_allotted,
                now,
            ],
        )?;
        Ok(SentenceRow {
            id,
            tree_id: opts.tree_id.to_string(),
            profile_id: opts.profile_id.to_string(),
            parent_id: opts.parent_id.map(String::from),
            text: opts.text.to_string(),
            language: opts.language.as_str().to_string(),
            bucket: opts.bucket.as_str().to_string(),
            read_time_proportion: opts.read_time_proportion,
            write_time_proportion: opts.write_time_proportion,
            read_time_allotted: opts.read_time_allotted,
            write_time_allotted: opts.write_time_allotted,
            created_at: now,
        })
    }

    /// Get sentence by ID.
    pub fn get_by_id(conn: &Connection, sentence_id: &str) -> Result<Option<SentenceRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {SENTENCE_COLUMNS} FROM sentences WHERE id = ?1"),
                params![sentence_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All sentences of a tree, oldest first.
    pub fn list_by_tree(conn: &Connection, tree_id: &str) -> Result<Vec<SentenceRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SENTENCE_COLUMNS} FROM sentences \
             WHERE tree_id = ?1 ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![tree_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Direct children of a sentence, oldest first.
    pub fn children_of(conn: &Connection, sentence_id: &str) -> Result<Vec<SentenceRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SENTENCE_COLUMNS} FROM sentences \
             WHERE parent_id = ?1 ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![sentence_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of sentences in a tree.
    pub fn count_by_tree(conn: &Connection, tree_id: &str) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sentences WHERE tree_id = ?1",
            params![tree_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SentenceRow> {
        Ok(SentenceRow {
            id: row.get(0)?,
            tree_id: row.get(1)?,
            profile_id: row.get(2)?,
            parent_id: row.get(3)?,
            text: row.get(4)?,
            language: row.get(5)?,
            bucket: row.get(6)?,
            read_time_proportion: row.get(7)?,
            write_time_proportion: row.get(8)?,
            read_time_allotted: row.get(9)?,
            write_time_allotted: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
