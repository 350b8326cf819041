//! Cull Task
//!
//! Background task that periodically removes expired cache rows.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::Cache;

/// Spawns a background task that culls expired rows every `cull_interval_secs`.
///
/// Each cull runs on the blocking thread pool. A failed cull is logged and the
/// loop carries on.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Cache::open(&config)?;
/// let cull_handle = spawn_cull_task(cache.clone(), 60);
/// // Later, during shutdown:
/// cull_handle.abort();
/// ```
pub fn spawn_cull_task(cache: Cache, cull_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cull_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cull task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let cache = cache.clone();
            match tokio::task::spawn_blocking(move || cache.cull()).await {
                Ok(Ok(removed)) => debug!("Cull pass removed {} expired rows", removed),
                Ok(Err(err)) => error!("Cull pass failed: {}", err),
                Err(err) => error!("Cull pass panicked: {}", err),
            }
        }
    })
}
