//! Resilient Cache - cached, retrying, circuit-breaking remote calls
//!
//! Wraps calls to remote services behind a TTL cache with LRU eviction, a
//! per-operation circuit breaker, a retry policy with backoff and timeouts,
//! and an admission limit. A small HTTP exporter publishes the metrics.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod models;
pub mod resilience;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{CacheStats, TtlCache};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{Config, DispatcherConfig};
pub use dispatcher::{CallDispatcher, CallOptions};
pub use error::{AttemptFailure, DispatchError};
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use resilience::{Backoff, BreakerState, CircuitBreaker, RetryPolicy};
pub use tasks::spawn_sweep_task;
