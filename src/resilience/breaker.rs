//! Circuit Breaker Module
//!
//! Per-operation failure counting with fail-fast once a threshold is reached.
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     consecutive failures reach max_failures
//! Open     → HalfOpen: reset_timeout elapsed since the last failure
//! HalfOpen → Closed:   success_threshold consecutive successes
//! HalfOpen → Open:     any failure (restarts the timeout window)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::clock::{SharedClock, SystemClock};

// == Breaker State ==
/// Derived state of a single breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls pass through
    Closed,
    /// Calls fail fast
    Open,
    /// Cool-down elapsed; calls pass through as probes
    HalfOpen,
}

// == Breaker Record ==
/// Failure bookkeeping for one operation key.
#[derive(Debug, Clone, Default)]
struct BreakerRecord {
    consecutive_failures: u32,
    last_failure_at: u64,
    probe_successes: u32,
}

/// Point-in-time view of one breaker, for exporters.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub operation_key: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub last_failure_at: u64,
    pub retry_after_ms: u64,
}

// == Circuit Breaker ==
/// Circuit breakers for a set of operation keys.
///
/// Keys are fully isolated: failures recorded for one never affect another.
#[derive(Debug)]
pub struct CircuitBreaker {
    records: HashMap<String, BreakerRecord>,
    max_failures: u32,
    reset_timeout_ms: u64,
    success_threshold: u32,
    clock: SharedClock,
}

impl CircuitBreaker {
    /// Creates a breaker set using the system clock.
    ///
    /// `max_failures` and `success_threshold` below 1 are treated as 1.
    pub fn new(max_failures: u32, reset_timeout_ms: u64, success_threshold: u32) -> Self {
        Self::with_clock(
            max_failures,
            reset_timeout_ms,
            success_threshold,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        max_failures: u32,
        reset_timeout_ms: u64,
        success_threshold: u32,
        clock: SharedClock,
    ) -> Self {
        Self {
            records: HashMap::new(),
            max_failures: max_failures.max(1),
            reset_timeout_ms,
            success_threshold: success_threshold.max(1),
            clock,
        }
    }

    // == Record Success ==
    /// Records a successful call.
    ///
    /// A breaker that never tripped is zeroed. A tripped breaker closes once
    /// `success_threshold` probes in a row have succeeded.
    pub fn record_success(&mut self, key: &str) {
        let Some(record) = self.records.get_mut(key) else {
            return;
        };

        if record.consecutive_failures >= self.max_failures {
            record.probe_successes += 1;
            if record.probe_successes < self.success_threshold {
                return;
            }
        }

        self.records.remove(key);
    }

    // == Record Failure ==
    /// Records a failed call, opening the breaker at `max_failures`.
    pub fn record_failure(&mut self, key: &str) {
        let now = self.clock.now_ms();
        let record = self.records.entry(key.to_string()).or_default();
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.last_failure_at = now;
        record.probe_successes = 0;
    }

    // == Is Open ==
    /// Returns true while calls for `key` must fail fast. Never mutates.
    pub fn is_open(&self, key: &str) -> bool {
        self.state(key) == BreakerState::Open
    }

    // == State ==
    pub fn state(&self, key: &str) -> BreakerState {
        match self.records.get(key) {
            Some(record) => self.derive_state(record),
            None => BreakerState::Closed,
        }
    }

    // == Retry After ==
    /// Milliseconds until a probe is allowed, 0 when not open.
    pub fn retry_after_ms(&self, key: &str) -> u64 {
        match self.records.get(key) {
            Some(record) if self.derive_state(record) == BreakerState::Open => {
                let elapsed = self.clock.now_ms().saturating_sub(record.last_failure_at);
                self.reset_timeout_ms.saturating_sub(elapsed)
            }
            _ => 0,
        }
    }

    pub fn consecutive_failures(&self, key: &str) -> u32 {
        self.records
            .get(key)
            .map(|r| r.consecutive_failures)
            .unwrap_or(0)
    }

    // == Reset ==
    /// Closes the breaker for `key` immediately. Returns true if it was tracked.
    pub fn reset(&mut self, key: &str) -> bool {
        self.records.remove(key).is_some()
    }

    // == Snapshot ==
    /// Status of every key with recorded failures, sorted by key.
    pub fn snapshot(&self) -> Vec<BreakerStatus> {
        let mut statuses: Vec<BreakerStatus> = self
            .records
            .iter()
            .map(|(key, record)| BreakerStatus {
                operation_key: key.clone(),
                state: self.derive_state(record),
                consecutive_failures: record.consecutive_failures,
                last_failure_at: record.last_failure_at,
                retry_after_ms: self.retry_after_ms(key),
            })
            .collect();
        statuses.sort_by(|a, b| a.operation_key.cmp(&b.operation_key));
        statuses
    }

    fn derive_state(&self, record: &BreakerRecord) -> BreakerState {
        if record.consecutive_failures < self.max_failures {
            return BreakerState::Closed;
        }
        let elapsed = self.clock.now_ms().saturating_sub(record.last_failure_at);
        if elapsed < self.reset_timeout_ms {
            BreakerState::Open
        } else {
            BreakerState::HalfOpen
        }
    }
}
