//! Table Cache - A key-value cache backed by a persistent table
//!
//! Values are stored under string keys with an absolute expiry. Expired rows are
//! masked on read and removed lazily, and an over-capacity write culls every
//! expired row in one sweep.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod table;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheOptions};
pub use config::Config;
pub use tasks::spawn_cull_task;
