//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from environment variables.

use std::env;

/// Capacity threshold used when `max_entries` is missing or not an integer.
pub const DEFAULT_MAX_ENTRIES: usize = 300;

/// Default time-to-live in seconds.
pub const DEFAULT_TIMEOUT: u64 = 300;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the SQLite database holding the cache table
    pub connection: String,
    /// Row count above which a write culls expired entries
    pub max_entries: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub timeout: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Seconds between background culls, 0 disables the task
    pub cull_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CONNECTION` - SQLite database path (default: cache.db)
    /// - `CACHE_MAX_ENTRIES` - Cull threshold (default: 300)
    /// - `CACHE_TIMEOUT` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CULL_INTERVAL` - Background cull frequency in seconds (default: 0, disabled)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            connection: lookup("CACHE_CONNECTION").unwrap_or(defaults.connection),
            max_entries: lookup("CACHE_MAX_ENTRIES")
                .map(|v| coerce_max_entries(&v))
                .unwrap_or(defaults.max_entries),
            timeout: lookup("CACHE_TIMEOUT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.timeout),
            server_port: lookup("SERVER_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.server_port),
            cull_interval: lookup("CULL_INTERVAL")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.cull_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: "cache.db".to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
            timeout: DEFAULT_TIMEOUT,
            server_port: 3000,
            cull_interval: 0,
        }
    }
}

// == Max Entries Coercion ==
/// Coerces a raw `max_entries` value to a row count.
///
/// Accepts an optionally signed integer surrounded by whitespace. Anything else
/// yields [`DEFAULT_MAX_ENTRIES`]. Negative values clamp to zero, so every write
/// on a non-empty table culls.
pub fn coerce_max_entries(raw: &str) -> usize {
    match raw.trim().parse::<i64>() {
        Ok(n) if n < 0 => 0,
        Ok(n) => usize::try_from(n).unwrap_or(usize::MAX),
        Err(_) => DEFAULT_MAX_ENTRIES,
    }
}
