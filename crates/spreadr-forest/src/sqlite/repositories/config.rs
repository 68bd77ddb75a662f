//! Configuration repository — the singleton experiment configuration row.
//!
//! The row is seeded by the v001 migration and only ever updated in place,
//! so a missing row is an internal error, not a not-found condition.

use rusqlite::{Connection, params};
use spreadr_core::Configuration;

use crate::errors::{ForestError, Result};

/// Configuration repository — stateless, every method takes `&Connection`.
pub struct ConfigRepo;

impl ConfigRepo {
    /// Read the current configuration.
    pub fn get(conn: &Connection) -> Result<Configuration> {
        conn.query_row(
            "SELECT target_branch_count, target_branch_depth, branch_probability,
                    heartbeat_seconds, heartbeat_margin_seconds, read_factor,
                    write_factor, min_tokens, pause_period_seconds
             FROM config WHERE id = 1",
            [],
            |row| {
                Ok(Configuration {
                    target_branch_count: row.get(0)?,
                    target_branch_depth: row.get(1)?,
                    branch_probability: row.get(2)?,
                    heartbeat_seconds: row.get(3)?,
                    heartbeat_margin_seconds: row.get(4)?,
                    read_factor: row.get(5)?,
                    write_factor: row.get(6)?,
                    min_tokens: row.get(7)?,
                    pause_period_seconds: row.get(8)?,
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                ForestError::Internal("config singleton row is missing".into())
            }
            e => ForestError::Sqlite(e),
        })
    }

    /// Overwrite the configuration. The caller validates first.
    pub fn update(conn: &Connection, config: &Configuration) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE config SET target_branch_count = ?1, target_branch_depth = ?2,
                    branch_probability = ?3, heartbeat_seconds = ?4,
                    heartbeat_margin_seconds = ?5, read_factor = ?6,
                    write_factor = ?7, min_tokens = ?8, pause_period_seconds = ?9,
                    updated_at = ?10
             WHERE id = 1",
            params![
                config.target_branch_count,
                config.target_branch_depth,
                config.branch_probability,
                config.heartbeat_seconds,
                config.heartbeat_margin_seconds,
                config.read_factor,
                config.write_factor,
                config.min_tokens,
                config.pause_period_seconds,
                now,
            ],
        )?;
        if changed == 0 {
            return Err(ForestError::Internal(
                "config singleton row is missing".into(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
