//! Cache Entry Module
//!
//! Defines a stored cache row and the second-resolution clock used for expiry.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};

// == Cache Entry ==
/// One physical row of the cache table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Surrogate identifier assigned by the table
    pub id: i64,
    /// Lookup key
    pub key: String,
    /// Serialized value
    pub value: Vec<u8>,
    /// Absolute expiry, whole seconds
    pub expires: DateTime<Utc>,
}

impl CacheEntry {
    // == Is Expired ==
    /// Checks whether the entry is dead at `now`.
    ///
    /// An entry stays live through the second it expires in and is dead only
    /// once `expires` is strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }

    /// Checks whether the entry is dead at the current second.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_truncated())
    }
}

// == Utility Functions ==
/// Returns the current UTC time with the sub-second part discarded.
pub fn now_truncated() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Returns the expiry for an entry written now with a TTL of `ttl_seconds`.
///
/// Saturates at the latest representable instant for oversized TTLs.
pub fn expiry_after(ttl_seconds: u64) -> DateTime<Utc> {
    let ttl = i64::try_from(ttl_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds);
    ttl.and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .trunc_subsecs(0)
}
