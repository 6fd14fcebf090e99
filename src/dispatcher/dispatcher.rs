//! Call Dispatcher
//!
//! Single entry point for remote calls in one resource domain: answers from
//! cache when it can, fails fast while a breaker is open, and otherwise runs
//! the call under admission control with retry, backoff and timeouts.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock, Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, TtlCache};
use crate::clock::{SharedClock, SystemClock};
use crate::config::DispatcherConfig;
use crate::dispatcher::CallOptions;
use crate::error::DispatchError;
use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::resilience::{retry_all, BreakerState, BreakerStatus, CircuitBreaker, RetryError, RetryPolicy};

type FlightMap = DashMap<String, Arc<AsyncMutex<()>>>;

// == Flight Guard ==
/// Holds the per-key lock of an in-flight cacheable call.
///
/// Dropping it unregisters the flight (if it is still the registered one)
/// and then releases the lock to waiting followers.
struct FlightGuard<'a> {
    flights: &'a FlightMap,
    key: String,
    lock: Arc<AsyncMutex<()>>,
    _held: OwnedMutexGuard<()>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flights
            .remove_if(&self.key, |_, registered| Arc::ptr_eq(registered, &self.lock));
    }
}

// == Call Dispatcher ==
/// Cached, circuit-broken, retrying call dispatcher for one resource domain.
///
/// Build one per domain at startup and share it by `Arc`; all state (cache,
/// breakers, metrics) lives for as long as the dispatcher does.
pub struct CallDispatcher {
    name: String,
    cache: RwLock<TtlCache<Value>>,
    breaker: Mutex<CircuitBreaker>,
    metrics: Arc<MetricsRecorder>,
    retry: RetryPolicy,
    admission: Option<Semaphore>,
    max_concurrent: usize,
    flights: FlightMap,
}

impl std::fmt::Debug for CallDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallDispatcher")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

impl CallDispatcher {
    // == Constructors ==
    pub fn new(name: impl Into<String>, config: &DispatcherConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Creates a dispatcher whose cache and breakers read time from `clock`.
    pub fn with_clock(name: impl Into<String>, config: &DispatcherConfig, clock: SharedClock) -> Self {
        let name = name.into();
        info!(
            domain = %name,
            max_entries = config.max_entries,
            default_ttl_ms = config.default_ttl_ms,
            max_failures = config.max_failures,
            max_attempts = config.max_attempts,
            max_concurrent = config.max_concurrent,
            "call dispatcher created"
        );

        Self {
            cache: RwLock::new(TtlCache::with_clock(
                config.max_entries,
                config.default_ttl_ms,
                clock.clone(),
            )),
            breaker: Mutex::new(CircuitBreaker::with_clock(
                config.max_failures,
                config.reset_timeout_ms,
                config.success_threshold,
                clock,
            )),
            metrics: Arc::new(MetricsRecorder::new()),
            retry: config.retry_policy(),
            admission: (config.max_concurrent > 0).then(|| Semaphore::new(config.max_concurrent)),
            max_concurrent: config.max_concurrent,
            flights: DashMap::new(),
            name,
        }
    }

    // == Invoke ==
    /// Dispatches `operation`, retrying every error.
    pub async fn invoke<T, E, F, Fut>(
        &self,
        operation_key: &str,
        options: CallOptions,
        operation: F,
    ) -> Result<T, DispatchError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.invoke_classified(operation_key, options, retry_all, operation)
            .await
    }

    /// Dispatches `operation`; errors for which `is_retryable` returns false
    /// are returned at once as [`DispatchError::NonRetryable`].
    pub async fn invoke_classified<T, E, F, Fut, C>(
        &self,
        operation_key: &str,
        options: CallOptions,
        is_retryable: C,
        operation: F,
    ) -> Result<T, DispatchError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let cache_key = options.cache_key(operation_key);

        if let Some(key) = &cache_key {
            if let Some(value) = self.cached::<T>(key).await {
                debug!(domain = %self.name, operation = operation_key, "cache hit");
                self.metrics.record_hit(operation_key);
                return Ok(value);
            }
        }
        self.metrics.record_miss(operation_key);

        self.check_breaker::<E>(operation_key)?;

        // Identical cacheable calls queue behind the one already running and
        // take its result from the cache.
        let _flight = match &cache_key {
            Some(key) => {
                let flight = self.join_flight(key).await;
                if let Some(value) = self.cached_uncounted::<T>(key).await {
                    debug!(domain = %self.name, operation = operation_key, "coalesced with in-flight call");
                    return Ok(value);
                }
                Some(flight)
            }
            None => None,
        };

        let _permit = self.admit().await;
        self.check_breaker::<E>(operation_key)?;

        let policy = options.retry_policy(&self.retry);
        let started = Instant::now();
        let result = policy.execute(operation_key, operation, is_retryable).await;
        let elapsed = started.elapsed();

        match result {
            Ok((value, attempts)) => {
                self.breaker().record_success(operation_key);
                if let Some(key) = cache_key {
                    self.store(key, &value, &options).await;
                }
                self.metrics.record_success(operation_key, elapsed);
                debug!(
                    domain = %self.name,
                    operation = operation_key,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "call succeeded"
                );
                Ok(value)
            }
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                self.record_breaker_failure(operation_key);
                self.metrics.record_failure(operation_key, elapsed);
                warn!(
                    domain = %self.name,
                    operation = operation_key,
                    attempts,
                    timed_out = last_error.is_timeout(),
                    "call failed after retries"
                );
                Err(DispatchError::RetryExhausted {
                    operation_key: operation_key.to_string(),
                    attempts,
                    last_error,
                })
            }
            Err(RetryError::NonRetryable { attempts, error }) => {
                self.metrics.record_failure(operation_key, elapsed);
                debug!(
                    domain = %self.name,
                    operation = operation_key,
                    attempts,
                    "call failed with non-retryable error"
                );
                Err(DispatchError::NonRetryable {
                    operation_key: operation_key.to_string(),
                    attempts,
                    source: error,
                })
            }
        }
    }

    // == Cache Management ==
    /// Drops the cached result for `operation_key` with these options' arguments.
    pub async fn invalidate(&self, operation_key: &str, options: &CallOptions) -> bool {
        match options.cache_key(operation_key) {
            Some(key) => self.cache.write().await.delete(&key),
            None => false,
        }
    }

    /// Drops every cached result, or only those of one operation.
    pub async fn clear_cache(&self, operation_key: Option<&str>) -> usize {
        let removed = self.cache.write().await.clear(operation_key);
        info!(domain = %self.name, namespace = ?operation_key, removed, "cache cleared");
        removed
    }

    /// Removes expired cache entries. Returns the number removed.
    pub async fn sweep(&self) -> usize {
        self.cache.write().await.sweep()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    // == Breaker Management ==
    pub fn breaker_state(&self, operation_key: &str) -> BreakerState {
        self.breaker().state(operation_key)
    }

    pub fn breaker_snapshot(&self) -> Vec<BreakerStatus> {
        self.breaker().snapshot()
    }

    /// Closes the breaker for `operation_key`. Returns true if it had state.
    pub fn reset_breaker(&self, operation_key: &str) -> bool {
        let reset = self.breaker().reset(operation_key);
        if reset {
            info!(domain = %self.name, operation = operation_key, "circuit breaker reset");
        }
        reset
    }

    // == Metrics ==
    /// Shared handle for exporters.
    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        Arc::clone(&self.metrics)
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_stats(&self) {
        self.metrics.reset();
        info!(domain = %self.name, "metrics reset");
    }

    // == Accessors ==
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls currently holding an admission permit.
    pub fn in_flight(&self) -> usize {
        match &self.admission {
            Some(semaphore) => self.max_concurrent - semaphore.available_permits(),
            None => 0,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    // == Internals ==
    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.write().await.get(key)?;
        self.decode(key, value)
    }

    /// Re-reads a key whose miss was already counted.
    async fn cached_uncounted<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.write().await.get_uncounted(key)?;
        self.decode(key, value)
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, value: Value) -> Option<T> {
        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(domain = %self.name, key, error = %err, "cached value has unexpected shape");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: String, value: &T, options: &CallOptions) {
        match serde_json::to_value(value) {
            Ok(json) => {
                let ttl_ms = options
                    .ttl
                    .map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
                self.cache.write().await.set(key, json, ttl_ms);
            }
            Err(err) => {
                warn!(domain = %self.name, key = %key, error = %err, "result not cacheable");
            }
        }
    }

    fn check_breaker<E>(&self, operation_key: &str) -> Result<(), DispatchError<E>> {
        let retry_after_ms = {
            let breaker = self.breaker();
            if !breaker.is_open(operation_key) {
                return Ok(());
            }
            breaker.retry_after_ms(operation_key)
        };

        self.metrics.record_rejection(operation_key);
        debug!(domain = %self.name, operation = operation_key, retry_after_ms, "circuit open, failing fast");
        Err(DispatchError::CircuitOpen {
            operation_key: operation_key.to_string(),
            retry_after_ms,
        })
    }

    fn record_breaker_failure(&self, operation_key: &str) {
        let opened = {
            let mut breaker = self.breaker();
            let was_open = breaker.is_open(operation_key);
            breaker.record_failure(operation_key);
            !was_open && breaker.is_open(operation_key)
        };

        if opened {
            warn!(domain = %self.name, operation = operation_key, "circuit breaker opened");
        }
    }

    async fn join_flight(&self, key: &str) -> FlightGuard<'_> {
        let lock = Arc::clone(self.flights.entry(key.to_string()).or_default().value());
        let held = Arc::clone(&lock).lock_owned().await;
        FlightGuard {
            flights: &self.flights,
            key: key.to_string(),
            lock,
            _held: held,
        }
    }

    async fn admit(&self) -> Option<SemaphorePermit<'_>> {
        match &self.admission {
            // The semaphore is never closed, so acquire cannot fail.
            Some(semaphore) => semaphore.acquire().await.ok(),
            None => None,
        }
    }

    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
