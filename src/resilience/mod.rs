//! Resilience Module
//!
//! Circuit breaking and retry with backoff around remote calls.

mod breaker;
mod retry;

pub use breaker::{BreakerState, BreakerStatus, CircuitBreaker};
pub use retry::{
    retry_all, AttemptOutcome, Backoff, CallAttempt, RetryError, RetryPolicy,
};
