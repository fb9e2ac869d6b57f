//! SQLite-backed reading store.
//!
//! Readings are stored as JSON keyed by their millisecond timestamp, so
//! `INSERT OR IGNORE` gives idempotent merges for free.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use thermolog_core::Reading;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::history::retention_cutoff_millis;
use crate::persistence::ensure_parent_dir;
use crate::reading_store::{MergeOutcome, ReadingStore};

// ============================================================================
// Migrations
// ============================================================================

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: r"
        CREATE TABLE IF NOT EXISTS readings (
            timestamp_ms INTEGER PRIMARY KEY,
            reading_json TEXT NOT NULL,
            stored_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
    ",
}];

/// Runs all pending migrations, each in its own transaction.
fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    let current = schema_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let apply = || -> Result<(), rusqlite::Error> {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql)?;
            tx.execute(
                "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
                params![migration.version],
            )?;
            tx.commit()
        };
        apply().map_err(|e| StoreError::Migration {
            version: migration.version,
            reason: e.to_string(),
        })?;
        info!(version = migration.version, "Applied schema migration");
    }

    Ok(())
}

/// Returns the current schema version (0 for a fresh database).
fn schema_version(conn: &Connection) -> Result<i64, StoreError> {
    let version = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| row.get(0))
        .optional()?;
    Ok(version.unwrap_or(0))
}

// ============================================================================
// SQLite Store
// ============================================================================

/// Durable reading store in a single SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteReadingStore {
    conn: Arc<Mutex<Connection>>,
    retention: Duration,
}

impl SqliteReadingStore {
    /// Opens or creates the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or migrated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open<P: AsRef<Path>>(path: P, retention: Duration) -> Result<Self, StoreError> {
        ensure_parent_dir(path.as_ref()).await?;
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn, retention)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot initialize.
    pub fn open_in_memory(retention: Duration) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, retention)
    }

    fn from_connection(conn: Connection, retention: Duration) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            retention,
        })
    }

    /// Current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version table cannot be read.
    pub async fn schema_version(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().await;
        schema_version(&conn)
    }

    fn decode_rows(rows: Vec<String>) -> Result<Vec<Reading>, StoreError> {
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl ReadingStore for SqliteReadingStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    #[instrument(skip(self, reading), fields(timestamp = %reading.timestamp))]
    async fn merge_at(&self, reading: &Reading, now: DateTime<Utc>) -> Result<MergeOutcome, StoreError> {
        reading.validate()?;

        let json = serde_json::to_string(reading)?;
        let key = reading.timestamp_millis();
        let cutoff = retention_cutoff_millis(self.retention, now);

        let conn = self.conn.lock().await;
        let tx = conn.unchecked_transaction()?;
        let added = tx.execute(
            "INSERT OR IGNORE INTO readings (timestamp_ms, reading_json) VALUES (?1, ?2)",
            params![key, json],
        )? > 0;
        let trimmed = tx.execute("DELETE FROM readings WHERE timestamp_ms < ?1", params![cutoff])?;
        tx.commit()?;

        let inserted = added && key >= cutoff;
        debug!(inserted, trimmed, "Merged reading");
        Ok(MergeOutcome { inserted, trimmed })
    }

    async fn list(&self) -> Result<Vec<Reading>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT reading_json FROM readings ORDER BY timestamp_ms ASC")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Self::decode_rows(rows)
    }

    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT reading_json FROM readings WHERE timestamp_ms >= ?1 ORDER BY timestamp_ms ASC",
        )?;
        let rows = stmt
            .query_map(params![since.timestamp_millis()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Self::decode_rows(rows)
    }

    async fn latest(&self) -> Result<Option<Reading>, StoreError> {
        let conn = self.conn.lock().await;
        let json: Option<String> = conn
            .query_row(
                "SELECT reading_json FROM readings ORDER BY timestamp_ms DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_database_is_migrated() {
        let store = SqliteReadingStore::open_in_memory(Duration::days(90)).unwrap();
        assert_eq!(store.schema_version().await.unwrap(), 1);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);
    }
}
