//! Cache Store Module
//!
//! Main cache engine translating get/set/delete into table operations.

use std::sync::Arc;

use bincode::Options;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{expiry_after, now_truncated, CacheEntry, MAX_KEY_LENGTH};
use crate::config::{Config, DEFAULT_MAX_ENTRIES, DEFAULT_TIMEOUT};
use crate::error::{CacheError, Result, StorageResult};
use crate::table::{CacheTable, SqliteTable};

// == Cache Options ==
/// Construction-time tuning for a [`Cache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Row count above which `set` culls expired rows first
    pub max_entries: usize,
    /// Default TTL in seconds
    pub timeout: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl From<&Config> for CacheOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_entries: config.max_entries,
            timeout: config.timeout,
        }
    }
}

// == Cache ==
/// Key-value cache whose only state is the backing table.
///
/// Clones share the same table. Nothing is held in memory between calls, so
/// any number of instances, threads or processes may use one table at once.
#[derive(Clone)]
pub struct Cache {
    /// Backing table, sole source of truth
    table: Arc<dyn CacheTable>,
    /// Cull threshold in physical rows
    max_entries: usize,
    /// Default TTL in seconds
    timeout: u64,
}

impl Cache {
    // == Constructors ==
    /// Creates a cache over `table`, creating the table schema if needed.
    pub fn new(table: Arc<dyn CacheTable>, options: CacheOptions) -> Result<Self> {
        table.ensure_schema()?;
        Ok(Self {
            table,
            max_entries: options.max_entries,
            timeout: options.timeout,
        })
    }

    /// Opens the SQLite database named by `config.connection`.
    pub fn open(config: &Config) -> Result<Self> {
        let table = SqliteTable::open(&config.connection)?;
        Self::new(Arc::new(table), CacheOptions::from(config))
    }

    // == Get ==
    /// Returns the value stored under `key`, or `default` on a miss.
    ///
    /// See [`Cache::lookup`].
    pub fn get<V: DeserializeOwned>(&self, key: &str, default: V) -> Result<V> {
        Ok(self.lookup(key)?.unwrap_or(default))
    }

    /// Returns the value stored under `key`, or `None` on a miss.
    ///
    /// Only the first row for the key is consulted. If it has expired every
    /// row for the key is deleted and the read counts as a miss.
    pub fn lookup<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        match self.live_entry(key)? {
            Some(entry) => Ok(Some(decode_value(&entry.value)?)),
            None => Ok(None),
        }
    }

    // == Contains ==
    /// Returns true when `key` has a live entry.
    ///
    /// Shares `lookup`'s side effect of deleting an expired entry.
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.live_entry(key)?.is_some())
    }

    fn live_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(entry) = self.table.select_by_key(key)?.into_iter().next() else {
            debug!("Cache miss for '{}'", key);
            return Ok(None);
        };

        if entry.is_expired_at(now_truncated()) {
            debug!("Cache entry '{}' expired at {}", key, entry.expires);
            self.delete(key)?;
            return Ok(None);
        }

        debug!("Cache hit for '{}'", key);
        Ok(Some(entry))
    }

    // == Set ==
    /// Stores `value` under `key` with the default TTL.
    ///
    /// See [`Cache::set_with_ttl`].
    pub fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<()> {
        self.set_with_ttl(key, value, None)
    }

    /// Stores `value` under `key`, expiring `ttl` seconds from now (or after
    /// the default TTL when `None`).
    ///
    /// The write is best effort. A transient storage failure while updating or
    /// inserting is logged and dropped, and the call still returns `Ok(())`.
    /// Key validation, serialization, the row count and any triggered cull
    /// report their errors as usual.
    pub fn set_with_ttl<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<u64>,
    ) -> Result<()> {
        validate_key(key)?;
        let payload = encode_value(value)?;
        let expires = expiry_after(ttl.unwrap_or(self.timeout));

        // Counts physical rows, expired ones included
        let rows = self.table.count()?;
        if rows > self.max_entries as u64 {
            debug!("Cache holds {} rows (limit {}), culling", rows, self.max_entries);
            self.cull()?;
        }

        match self.write(key, &payload, expires) {
            Ok(()) => Ok(()),
            Err(err) if err.is_transient() => {
                warn!("Dropped cache write for '{}': {}", key, err);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Updates `key` in place if present, inserts it otherwise.
    ///
    /// Known race: the existence check and the write are separate calls.
    /// Concurrent writers on an absent key can both insert, leaving duplicate
    /// rows that `get` tolerates and `delete` or `cull` remove.
    fn write(&self, key: &str, payload: &[u8], expires: DateTime<Utc>) -> StorageResult<()> {
        if self.table.select_by_key(key)?.is_empty() {
            self.table.insert(key, payload, expires)
        } else {
            self.table.update_by_key(key, payload, expires)
        }
    }

    // == Delete ==
    /// Removes every row stored under `key`. Missing keys are not an error.
    ///
    /// Returns the number of rows removed.
    pub fn delete(&self, key: &str) -> Result<u64> {
        let removed = self.table.delete_by_key(key)?;
        debug!("Deleted {} row(s) for '{}'", removed, key);
        Ok(removed)
    }

    // == Cull ==
    /// Removes every expired row, returning how many were removed.
    pub fn cull(&self) -> Result<u64> {
        let removed = self.table.delete_expired(now_truncated())?;
        if removed > 0 {
            info!("Culled {} expired cache rows", removed);
        }
        Ok(removed)
    }

    // == Length ==
    /// Returns the number of physical rows, expired ones included.
    pub fn len(&self) -> Result<u64> {
        Ok(self.table.count()?)
    }

    /// Returns true if the table holds no rows.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the cull threshold.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Returns the default TTL in seconds.
    pub fn timeout(&self) -> u64 {
        self.timeout
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

// == Value Codec ==
// bincode keeps every value serde can describe, NaN and nested `Option`s included.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
}

/// Encodes a value into the blob stored in the `value` column.
pub(crate) fn encode_value<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>> {
    Ok(codec().serialize(value)?)
}

/// Decodes a `value` column blob. Trailing bytes are an error.
pub(crate) fn decode_value<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    Ok(codec().deserialize(bytes)?)
}
