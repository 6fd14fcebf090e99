//! TTL Sweep Task
//!
//! Background task that periodically removes expired cached results, so idle
//! entries do not hold memory until the next eviction.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dispatcher::CallDispatcher;

/// Spawns a background task that sweeps `dispatcher`'s cache every
/// `interval_secs` seconds (at least one).
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let dispatcher = Arc::new(CallDispatcher::new("cloud", &DispatcherConfig::default()));
/// let sweep_handle = spawn_sweep_task(dispatcher.clone(), 60);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(dispatcher: Arc<CallDispatcher>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            domain = dispatcher.name(),
            "Starting TTL sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = dispatcher.sweep().await;

            if removed > 0 {
                info!(domain = dispatcher.name(), "TTL sweep: removed {} expired entries", removed);
            } else {
                debug!(domain = dispatcher.name(), "TTL sweep: no expired entries found");
            }
        }
    })
}
