//! Retry Policy Module
//!
//! Runs a fallible async operation up to a bounded number of times, waiting
//! between attempts and racing each attempt against a timeout.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::error::AttemptFailure;

// == Backoff ==
/// Delay growth between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// `base * n` before attempt `n`
    #[default]
    Linear,
    /// `base * 2^(n-2)` before attempt `n`
    Exponential,
}

impl std::str::FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Backoff::Linear),
            "exponential" => Ok(Backoff::Exponential),
            other => Err(format!("unknown backoff '{}'", other)),
        }
    }
}

// == Attempt Outcome ==
/// Classification of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
}

// == Call Attempt ==
/// One attempt of an operation. Logged, never stored.
#[derive(Debug, Clone)]
pub struct CallAttempt<'a> {
    pub operation_key: &'a str,
    pub started_at: Instant,
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
}

impl CallAttempt<'_> {
    fn log(&self) {
        debug!(
            operation = self.operation_key,
            attempt = self.attempt_number,
            outcome = ?self.outcome,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "call attempt finished"
        );
    }
}

// == Retry Error ==
/// Why [`RetryPolicy::execute`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// All attempts failed; carries the last failure
    Exhausted {
        attempts: u32,
        last_error: AttemptFailure<E>,
    },
    /// The classifier rejected the error; no further attempts were made
    NonRetryable { attempts: u32, error: E },
}

// == Retry Policy ==
/// Bounded retry with backoff and a per-attempt timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            backoff: Backoff::Linear,
            attempt_timeout: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Linear,
            attempt_timeout,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    // == Delay ==
    /// Delay to wait before attempt `attempt` (1-based). Zero for the first.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    // == Execute ==
    /// Runs `operation` until it succeeds, the classifier rejects an error,
    /// or `max_attempts` (at least 1) attempts have been made.
    pub async fn execute<T, E, F, Fut, C>(
        &self,
        operation_key: &str,
        mut operation: F,
        is_retryable: C,
    ) -> Result<(T, u32), RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                debug!(
                    operation = operation_key,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            let started_at = Instant::now();
            let result = tokio::time::timeout(self.attempt_timeout, operation()).await;
            let mut record = CallAttempt {
                operation_key,
                started_at,
                attempt_number: attempt,
                outcome: AttemptOutcome::Success,
            };

            let failure = match result {
                Ok(Ok(value)) => {
                    record.log();
                    return Ok((value, attempt));
                }
                Ok(Err(err)) if !is_retryable(&err) => {
                    record.outcome = AttemptOutcome::FatalFailure;
                    record.log();
                    return Err(RetryError::NonRetryable {
                        attempts: attempt,
                        error: err,
                    });
                }
                Ok(Err(err)) => AttemptFailure::Failed(err),
                Err(_) => AttemptFailure::Timeout {
                    after_ms: self.attempt_timeout.as_millis() as u64,
                },
            };

            if attempt >= max_attempts {
                record.outcome = AttemptOutcome::FatalFailure;
                record.log();
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: failure,
                });
            }

            record.outcome = AttemptOutcome::RetryableFailure;
            record.log();
        }
    }
}

/// Classifier that retries every error.
pub fn retry_all<E>(_: &E) -> bool {
    true
}
