//! SQLite Table
//!
//! Persistent [`CacheTable`] on a single rusqlite connection.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};
use tracing::debug;

use crate::cache::CacheEntry;
use crate::error::{StorageError, StorageResult};
use crate::table::CacheTable;

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cache_key VARCHAR(60) NOT NULL,
        value BLOB NOT NULL,
        expires INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS cache_key_idx ON cache (cache_key);
";

/// How long a call waits on a database locked by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// == SQLite Table ==
/// Cache table stored in an SQLite database file.
///
/// Calls on one instance are serialized on its connection. Separate
/// instances, in this process or another, coordinate through SQLite's file
/// locking only.
#[derive(Debug)]
pub struct SqliteTable {
    conn: Mutex<Connection>,
}

impl SqliteTable {
    // == Constructors ==
    /// Opens (or creates) the database at `path`. `":memory:"` opens a
    /// private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(classify)?;
        debug!("Opened SQLite cache database at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Replaces the default five second wait on a locked database.
    pub fn with_busy_timeout(self, timeout: Duration) -> StorageResult<Self> {
        self.with_conn(|conn| conn.busy_timeout(timeout))?;
        Ok(self)
    }

    fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("Connection lock poisoned: {}", e)))?;
        f(&conn).map_err(classify)
    }
}

impl CacheTable for SqliteTable {
    fn ensure_schema(&self) -> StorageResult<()> {
        self.with_conn(|conn| conn.execute_batch(CREATE_SCHEMA))
    }

    fn count(&self) -> StorageResult<u64> {
        let count = self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get::<_, i64>(0))
        })?;
        Ok(count.max(0) as u64)
    }

    fn select_by_key(&self, key: &str) -> StorageResult<Vec<CacheEntry>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, cache_key, value, expires FROM cache WHERE cache_key = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![key], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        rows.into_iter()
            .map(|(id, key, value, expires)| {
                let expires = DateTime::from_timestamp(expires, 0).ok_or_else(|| {
                    StorageError::Schema(format!("Row {} has out-of-range expiry {}", id, expires))
                })?;
                Ok(CacheEntry {
                    id,
                    key,
                    value,
                    expires,
                })
            })
            .collect()
    }

    fn insert(&self, key: &str, value: &[u8], expires: DateTime<Utc>) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.prepare_cached("INSERT INTO cache (cache_key, value, expires) VALUES (?1, ?2, ?3)")?
                .execute(params![key, value, expires.timestamp()])
        })?;
        Ok(())
    }

    fn update_by_key(
        &self,
        key: &str,
        value: &[u8],
        expires: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.prepare_cached("UPDATE cache SET value = ?2, expires = ?3 WHERE cache_key = ?1")?
                .execute(params![key, value, expires.timestamp()])
        })?;
        Ok(())
    }

    fn delete_by_key(&self, key: &str) -> StorageResult<u64> {
        let removed = self.with_conn(|conn| {
            conn.prepare_cached("DELETE FROM cache WHERE cache_key = ?1")?
                .execute(params![key])
        })?;
        Ok(removed as u64)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let removed = self.with_conn(|conn| {
            conn.prepare_cached("DELETE FROM cache WHERE expires < ?1")?
                .execute(params![now.timestamp()])
        })?;
        Ok(removed as u64)
    }
}

// == Error Classification ==
/// Maps a rusqlite error onto the storage error taxonomy.
fn classify(err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::ConstraintViolation
            | ErrorCode::DiskFull
            | ErrorCode::SystemIoFailure
            | ErrorCode::OperationInterrupted => StorageError::Transient(err.to_string()),
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::PermissionDenied
            | ErrorCode::ReadOnly => StorageError::Unavailable(err.to_string()),
            _ => StorageError::Schema(err.to_string()),
        },
        rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::InvalidColumnIndex(_)
        | rusqlite::Error::InvalidColumnName(_)
        | rusqlite::Error::FromSqlConversionFailure(..) => StorageError::Schema(err.to_string()),
        _ => StorageError::Unavailable(err.to_string()),
    }
}
