//! Error types
//!
//! [`DispatchError`] is what callers of the dispatcher see; [`ApiError`] is
//! rendered by the stats exporter as a JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Attempt Failure ==
/// Why the last attempt of a call failed.
#[derive(Error, Debug)]
pub enum AttemptFailure<E> {
    /// The operation returned an error
    #[error("{0}")]
    Failed(#[source] E),

    /// The attempt did not finish in time
    #[error("attempt timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl<E> AttemptFailure<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AttemptFailure::Timeout { .. })
    }

    /// Returns the underlying operation error, if the attempt did not time out.
    pub fn into_inner(self) -> Option<E> {
        match self {
            AttemptFailure::Failed(err) => Some(err),
            AttemptFailure::Timeout { .. } => None,
        }
    }
}

// == Dispatch Error ==
/// Error returned by [`crate::CallDispatcher::invoke`].
#[derive(Error, Debug)]
pub enum DispatchError<E> {
    /// The breaker for this operation is open; the operation was not called
    #[error("circuit open for '{operation_key}', retry after {retry_after_ms}ms")]
    CircuitOpen {
        operation_key: String,
        retry_after_ms: u64,
    },

    /// Every attempt failed
    #[error("'{operation_key}' failed after {attempts} attempt(s): {last_error}")]
    RetryExhausted {
        operation_key: String,
        attempts: u32,
        #[source]
        last_error: AttemptFailure<E>,
    },

    /// The operation failed with an error classified as not worth retrying
    #[error("'{operation_key}' failed: {source}")]
    NonRetryable {
        operation_key: String,
        /// Attempts made, including retryable failures before this one
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> DispatchError<E> {
    pub fn operation_key(&self) -> &str {
        match self {
            DispatchError::CircuitOpen { operation_key, .. }
            | DispatchError::RetryExhausted { operation_key, .. }
            | DispatchError::NonRetryable { operation_key, .. } => operation_key,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, DispatchError::CircuitOpen { .. })
    }

    /// True when the call was exhausted because its last attempt timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DispatchError::RetryExhausted { last_error, .. } if last_error.is_timeout()
        )
    }

    /// Number of times the operation was called, 0 for a fail-fast.
    pub fn attempts(&self) -> u32 {
        match self {
            DispatchError::CircuitOpen { .. } => 0,
            DispatchError::RetryExhausted { attempts, .. }
            | DispatchError::NonRetryable { attempts, .. } => *attempts,
        }
    }
}

// == API Error ==
/// Errors surfaced by the HTTP stats exporter.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No dispatcher registered under this domain
    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    /// No breaker tracked for this operation
    #[error("No breaker state for operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnknownDomain(_) | ApiError::UnknownOperation(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
