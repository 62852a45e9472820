//! SQLite persistence for finished periods.
//!
//! Uses `rusqlite` with bundled SQLite. Handles:
//! - One `period` row per committed period (start, length, totals)
//! - One `period_stat` row per device seen in that period
//! - Range and per-day queries for reporting
//! - Auto-pruning of old periods

mod history;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use rusqlite::Connection;

use crate::error::RecorderError;

pub use history::local_midnight_utc;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS period (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        period_start INTEGER NOT NULL,
        period_len INTEGER NOT NULL,
        total_bytes INTEGER NOT NULL DEFAULT 0,
        total_packets INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_period_start ON period(period_start);

    CREATE TABLE IF NOT EXISTS period_stat (
        period_id INTEGER NOT NULL REFERENCES period(id),
        ip_addr INTEGER NOT NULL,
        bytes_in INTEGER NOT NULL DEFAULT 0,
        bytes_out INTEGER NOT NULL DEFAULT 0,
        packets INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (period_id, ip_addr)
    );
";

/// Manages the SQLite database for period history.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self, RecorderError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        // Enable WAL mode so `report` can read while the recorder writes.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh private in-memory database.
    pub fn open_in_memory() -> Result<Self, RecorderError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn open_memory_db() -> Database {
        Database::open_in_memory().expect("in-memory database")
    }

    #[test]
    fn test_schema_is_idempotent() {
        let db = open_memory_db();
        let conn = db.conn().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('period', 'period_stat')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_open_unusable_path_is_database_error() {
        let dir = std::env::temp_dir().join(format!("netrecorder-open-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        // A directory cannot be opened as a database file.
        let err = match Database::open(&dir) {
            Ok(_) => panic!("opening a directory should fail"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), "Database");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
