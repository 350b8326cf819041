//! In-memory Table
//!
//! Process-local [`CacheTable`]. Useful for testing and development. Data is
//! lost when the process terminates.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::cache::CacheEntry;
use crate::error::{StorageError, StorageResult};
use crate::table::CacheTable;

#[derive(Debug, Default)]
struct Rows {
    next_id: i64,
    by_id: BTreeMap<i64, CacheEntry>,
}

// == Memory Table ==
/// Thread-safe in-memory cache table.
#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: RwLock<Rows>,
}

impl MemoryTable {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, Rows>> {
        self.rows
            .read()
            .map_err(|e| StorageError::Unavailable(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> StorageResult<std::sync::RwLockWriteGuard<'_, Rows>> {
        self.rows
            .write()
            .map_err(|e| StorageError::Unavailable(format!("Failed to acquire write lock: {}", e)))
    }
}

impl CacheTable for MemoryTable {
    fn ensure_schema(&self) -> StorageResult<()> {
        Ok(())
    }

    fn count(&self) -> StorageResult<u64> {
        Ok(self.read()?.by_id.len() as u64)
    }

    fn select_by_key(&self, key: &str) -> StorageResult<Vec<CacheEntry>> {
        Ok(self
            .read()?
            .by_id
            .values()
            .filter(|entry| entry.key == key)
            .cloned()
            .collect())
    }

    fn insert(&self, key: &str, value: &[u8], expires: DateTime<Utc>) -> StorageResult<()> {
        let mut rows = self.write()?;
        rows.next_id += 1;
        let id = rows.next_id;
        rows.by_id.insert(
            id,
            CacheEntry {
                id,
                key: key.to_string(),
                value: value.to_vec(),
                expires,
            },
        );
        Ok(())
    }

    fn update_by_key(
        &self,
        key: &str,
        value: &[u8],
        expires: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut rows = self.write()?;
        for entry in rows.by_id.values_mut().filter(|entry| entry.key == key) {
            entry.value = value.to_vec();
            entry.expires = expires;
        }
        Ok(())
    }

    fn delete_by_key(&self, key: &str) -> StorageResult<u64> {
        let mut rows = self.write()?;
        let before = rows.by_id.len();
        rows.by_id.retain(|_, entry| entry.key != key);
        Ok((before - rows.by_id.len()) as u64)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut rows = self.write()?;
        let before = rows.by_id.len();
        rows.by_id.retain(|_, entry| !entry.is_expired_at(now));
        Ok((before - rows.by_id.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::exercise_contract;

    #[test]
    fn test_memory_contract() {
        exercise_contract(&MemoryTable::new());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let table = MemoryTable::new();
        let expires = crate::cache::expiry_after(60);
        table.insert("a", b"1", expires).unwrap();
        table.delete_by_key("a").unwrap();
        table.insert("a", b"2", expires).unwrap();

        let rows = table.select_by_key("a").unwrap();
        assert_eq!(rows[0].id, 2);
    }
}
