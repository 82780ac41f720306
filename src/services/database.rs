use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// SQLite-backed store of whole JSON blobs keyed by name.
///
/// Every write replaces the full value; there is no partial update.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        // Create directory if it doesn't exist
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(db_path).context("Failed to open database")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize_tables()?;

        info!("Database initialized: {}", db_path);
        Ok(db)
    }

    /// Private database that vanishes when dropped
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize_tables()?;
        Ok(db)
    }

    fn initialize_tables(&self) -> Result<()> {
        self.lock()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection mutex poisoned"))
    }

    /// Read a blob, `None` when the key was never written
    pub fn load_blob(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM blobs WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("Failed to read blob '{}'", key))?;
        Ok(value)
    }

    /// Replace a blob wholesale
    pub fn save_blob(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = chrono::Utc::now().timestamp_millis();
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, updated_at],
            )
            .with_context(|| format!("Failed to write blob '{}'", key))?;
        Ok(())
    }

    /// Last write time of a blob, unix millis
    pub fn blob_updated_at(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let updated_at = conn
            .query_row(
                "SELECT updated_at FROM blobs WHERE key = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(updated_at)
    }
}
