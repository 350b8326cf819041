//! Cache Module
//!
//! Table-backed caching with lazy TTL expiry and capacity-triggered culling.

mod entry;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{expiry_after, now_truncated, CacheEntry};
pub use store::{Cache, CacheOptions};

// == Public Constants ==
/// Maximum allowed key length in characters, matching the `cache_key` column
pub const MAX_KEY_LENGTH: usize = 60;
