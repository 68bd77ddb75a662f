//! Profile repository — minimal participant records.
//!
//! Profiles exist here only as lock holders and sentence authors; account
//! and credit machinery belongs to the web layer.

use rusqlite::{Connection, OptionalExtension, params};
use spreadr_core::{Language, ProfileId};

use crate::errors::Result;
use crate::sqlite::row_types::ProfileRow;

/// Profile repository — stateless, every method takes `&Connection`.
pub struct ProfileRepo;

impl ProfileRepo {
    /// Create a new profile.
    pub fn create(conn: &Connection, mothertongue: Language) -> Result<ProfileRow> {
        let id = ProfileId::new().into_inner();
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO profiles (id, mothertongue, created_at) VALUES (?1, ?2, ?3)",
            params![id, mothertongue.as_str(), now],
        )?;
        Ok(ProfileRow {
            id,
            mothertongue: mothertongue.as_str().to_string(),
            created_at: now,
        })
    }

    /// Get profile by ID.
    pub fn get_by_id(conn: &Connection, profile_id: &str) -> Result<Option<ProfileRow>> {
        let row = conn
            .query_row(
                "SELECT id, mothertongue, created_at FROM profiles WHERE id = ?1",
                params![profile_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Check if a profile exists.
    pub fn exists(conn: &Connection, profile_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE id = ?1)",
            params![profile_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
        Ok(ProfileRow {
            id: row.get(0)?,
            mothertongue: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn create_profile() {
        let conn = setup();
        let profile = ProfileRepo::create(&conn, Language::French).unwrap();
        assert!(profile.id.starts_with("prof_"));
        assert_eq!(profile.mothertongue, "french");
    }

    #[test]
    fn get_by_id() {
        let conn = setup();
        let created = ProfileRepo::create(&conn, Language::English).unwrap();
        let found = ProfileRepo::get_by_id(&conn, &created.id).unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.mothertongue, "english");
    }

    #[test]
    fn exists_profile() {
        let conn = setup();
        let profile = ProfileRepo::create(&conn, Language::Other).unwrap();
        assert!(ProfileRepo::exists(&conn, &profile.id).unwrap());
        assert!(!ProfileRepo::exists(&conn, "prof_nonexistent").unwrap());
    }
}
