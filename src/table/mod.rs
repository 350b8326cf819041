//! Table Module
//!
//! The storage seam of the cache. A [`CacheTable`] is a single table of
//! `(id, cache_key, value, expires)` rows supporting the handful of
//! operations the cache needs. Keys are not unique at this level.

mod memory;
mod sqlite;

use chrono::{DateTime, Utc};

use crate::cache::CacheEntry;
use crate::error::StorageResult;

pub use memory::MemoryTable;
pub use sqlite::SqliteTable;

// == Cache Table ==
/// Row-level access to the persistent cache table.
///
/// Every call is independently synchronized by the implementation. No call
/// sequence is atomic.
pub trait CacheTable: Send + Sync {
    /// Creates the table if it does not exist yet.
    fn ensure_schema(&self) -> StorageResult<()>;

    /// Returns the total number of physical rows, expired ones included.
    fn count(&self) -> StorageResult<u64>;

    /// Returns every row stored under `key`, oldest first.
    fn select_by_key(&self, key: &str) -> StorageResult<Vec<CacheEntry>>;

    /// Appends a new row.
    fn insert(&self, key: &str, value: &[u8], expires: DateTime<Utc>) -> StorageResult<()>;

    /// Overwrites value and expiry of every row stored under `key`.
    fn update_by_key(&self, key: &str, value: &[u8], expires: DateTime<Utc>)
        -> StorageResult<()>;

    /// Removes every row stored under `key`, returning how many went.
    fn delete_by_key(&self, key: &str) -> StorageResult<u64>;

    /// Removes every row whose expiry is strictly before `now`.
    fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}
