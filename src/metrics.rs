//! Metrics Module
//!
//! Per-operation counters for dispatched calls: cache hits and misses,
//! successes, failures, fail-fast rejections and latency distribution.
//! Snapshots are computed from the live counters on every request.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

// == Public Constants ==
/// Upper bounds (inclusive, ms) of the latency histogram buckets.
/// One extra bucket counts everything slower than the last bound.
pub const LATENCY_BUCKETS_MS: [u64; 6] = [10, 50, 100, 500, 1_000, 5_000];

// == Operation Metrics ==
/// Raw counters for one operation key.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OperationMetrics {
    /// Every dispatched call, cached or not
    pub total_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Calls that ran and returned a value
    pub successes: u64,
    /// Calls that ran and failed (exhausted, timed out or non-retryable)
    pub failures: u64,
    /// Calls refused by an open breaker
    pub rejections: u64,
    pub total_latency_ms: u64,
    pub min_latency_ms: Option<u64>,
    pub max_latency_ms: u64,
    /// Counts per [`LATENCY_BUCKETS_MS`] bound, plus an overflow bucket
    pub latency_buckets: [u64; LATENCY_BUCKETS_MS.len() + 1],
}

impl OperationMetrics {
    /// Fraction of calls answered from cache.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.cache_hits, self.total_calls)
    }

    /// Fraction of calls that did not produce a value (failures and rejections).
    pub fn failure_rate(&self) -> f64 {
        ratio(self.failures + self.rejections, self.total_calls)
    }

    /// Mean latency of calls that actually ran.
    pub fn avg_latency_ms(&self) -> f64 {
        let completed = self.successes + self.failures;
        if completed == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / completed as f64
        }
    }

    fn observe_latency(&mut self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.total_latency_ms += ms;
        self.min_latency_ms = Some(self.min_latency_ms.map_or(ms, |min| min.min(ms)));
        self.max_latency_ms = self.max_latency_ms.max(ms);

        let bucket = LATENCY_BUCKETS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.latency_buckets[bucket] += 1;
    }

    fn merge(&mut self, other: &OperationMetrics) {
        self.total_calls += other.total_calls;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.successes += other.successes;
        self.failures += other.failures;
        self.rejections += other.rejections;
        self.total_latency_ms += other.total_latency_ms;
        self.min_latency_ms = match (self.min_latency_ms, other.min_latency_ms) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_latency_ms = self.max_latency_ms.max(other.max_latency_ms);
        for (total, count) in self.latency_buckets.iter_mut().zip(other.latency_buckets) {
            *total += count;
        }
    }
}

// == Snapshots ==
/// Counters and derived rates for one operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSnapshot {
    #[serde(flatten)]
    pub counters: OperationMetrics,
    pub hit_rate: f64,
    pub failure_rate: f64,
    pub avg_latency_ms: f64,
}

impl From<OperationMetrics> for OperationSnapshot {
    fn from(counters: OperationMetrics) -> Self {
        Self {
            hit_rate: counters.hit_rate(),
            failure_rate: counters.failure_rate(),
            avg_latency_ms: counters.avg_latency_ms(),
            counters,
        }
    }
}

/// Aggregate view over every operation.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_calls: u64,
    pub hit_rate: f64,
    pub failure_rate: f64,
    pub avg_latency_ms: f64,
    pub totals: OperationMetrics,
    pub operations: BTreeMap<String, OperationSnapshot>,
}

// == Metrics Recorder ==
/// Thread-safe metrics store for one dispatcher.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    operations: Mutex<HashMap<String, OperationMetrics>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, operation_key: &str) {
        self.update(operation_key, |m| {
            m.total_calls += 1;
            m.cache_hits += 1;
        });
    }

    pub fn record_miss(&self, operation_key: &str) {
        self.update(operation_key, |m| {
            m.total_calls += 1;
            m.cache_misses += 1;
        });
    }

    pub fn record_success(&self, operation_key: &str, duration: Duration) {
        self.update(operation_key, |m| {
            m.successes += 1;
            m.observe_latency(duration);
        });
    }

    pub fn record_failure(&self, operation_key: &str, duration: Duration) {
        self.update(operation_key, |m| {
            m.failures += 1;
            m.observe_latency(duration);
        });
    }

    pub fn record_rejection(&self, operation_key: &str) {
        self.update(operation_key, |m| m.rejections += 1);
    }

    /// Counters for one operation, if it has been seen.
    pub fn operation(&self, operation_key: &str) -> Option<OperationMetrics> {
        self.lock().get(operation_key).cloned()
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> MetricsSnapshot {
        let operations = self.lock().clone();

        let mut totals = OperationMetrics::default();
        for metrics in operations.values() {
            totals.merge(metrics);
        }

        MetricsSnapshot {
            total_calls: totals.total_calls,
            hit_rate: totals.hit_rate(),
            failure_rate: totals.failure_rate(),
            avg_latency_ms: totals.avg_latency_ms(),
            operations: operations
                .into_iter()
                .map(|(key, metrics)| (key, OperationSnapshot::from(metrics)))
                .collect(),
            totals,
        }
    }

    // == Reset ==
    /// Zeroes every counter.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn update<F>(&self, operation_key: &str, apply: F)
    where
        F: FnOnce(&mut OperationMetrics),
    {
        let mut operations = self.lock();
        match operations.get_mut(operation_key) {
            Some(metrics) => apply(metrics),
            None => {
                let mut metrics = OperationMetrics::default();
                apply(&mut metrics);
                operations.insert(operation_key.to_string(), metrics);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, OperationMetrics>> {
        // Counters stay usable even if a holder panicked mid-update.
        self.operations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
