//! SQLite connection pooling for the relay's read-mostly workload.
//!
//! Every accepted transcription costs one voice lookup; writes (session
//! bookings, avatar registrations, attendee batches) are rare and small.
//! Connections therefore run in WAL mode so lookups never wait behind a
//! writer, and contention is absorbed by a busy timeout rather than
//! surfaced as an immediate `SQLITE_BUSY`.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Duration;
use thiserror::Error;

/// Sizing and contention settings for the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// How long a connection waits on a locked database before giving up.
    pub busy_timeout: Duration,
    /// Upper bound on pooled connections. Lookups are single-row reads, so
    /// a handful of connections serves many concurrent rooms.
    pub max_connections: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            max_connections: 4,
        }
    }
}

/// The pooled SQLite handle shared across handlers.
pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Opens (or creates) the database at `db_path` and builds the pool.
/// `:memory:` gives a private in-memory database, which the tests use.
///
/// # Errors
///
/// Returns [`PoolError::PoolInit`] if no initial connection can be
/// established or configured.
pub fn create_pool(db_path: &str, settings: PoolSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(move |conn| configure_connection(conn, settings));

    let pool = Pool::builder()
        .max_size(settings.max_connections)
        .build(manager)?;
    Ok(pool)
}

/// Per-connection setup: WAL journaling, NORMAL synchronous (durability to
/// the WAL is enough for join records), enforced foreign keys, and the
/// configured busy timeout.
fn configure_connection(conn: &Connection, settings: PoolSettings) -> rusqlite::Result<()> {
    // journal_mode reports the mode actually in effect; in-memory
    // databases cannot use WAL and answer "memory".
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    if mode != "wal" && mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode is {} instead of wal", mode)),
        ));
    }

    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(settings.busy_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_backed_pool_runs_wal_with_configured_settings() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("pool_test.db");
        let settings = PoolSettings {
            busy_timeout: Duration::from_millis(1_250),
            max_connections: 2,
        };

        let pool = create_pool(db_path.to_str().expect("utf-8 path"), settings)
            .expect("pool creation should succeed");
        assert_eq!(pool.max_size(), 2);

        let conn = pool.get().expect("should get a connection");

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .expect("should query journal_mode");
        assert_eq!(mode, "wal");

        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .expect("should query foreign_keys");
        assert_eq!(fk, 1);

        let busy: i32 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .expect("should query busy_timeout");
        assert_eq!(busy, 1_250);
    }

    #[test]
    fn in_memory_pool_is_accepted_for_tests() {
        let pool = create_pool(":memory:", PoolSettings::default())
            .expect("in-memory pool should build");
        let conn = pool.get().expect("should get a connection");

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .expect("should query journal_mode");
        assert_eq!(mode, "memory");
    }
}
