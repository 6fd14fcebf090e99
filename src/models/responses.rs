//! Response DTOs for the stats exporter API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::metrics::MetricsSnapshot;
use crate::resilience::BreakerStatus;

/// Summary of one domain (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct DomainSummary {
    pub domain: String,
    pub total_calls: u64,
    pub hit_rate: f64,
    pub failure_rate: f64,
    pub avg_latency_ms: f64,
    pub in_flight: usize,
    pub open_breakers: usize,
    pub cache: CacheStatsResponse,
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub domains: Vec<DomainSummary>,
}

/// Response body for GET /stats/:domain
#[derive(Debug, Clone, Serialize)]
pub struct DomainStatsResponse {
    pub domain: String,
    pub in_flight: usize,
    pub max_concurrent: usize,
    pub metrics: MetricsSnapshot,
    pub cache: CacheStatsResponse,
}

/// Cache statistics with the derived hit rate
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_entries: usize,
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for GET /breakers/:domain
#[derive(Debug, Clone, Serialize)]
pub struct BreakersResponse {
    pub domain: String,
    pub breakers: Vec<BreakerStatus>,
}

/// Response body for mutating admin endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    /// Success message
    pub message: String,
    /// Entries affected, where that makes sense
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            removed: None,
        }
    }

    pub fn with_removed(mut self, removed: usize) -> Self {
        self.removed = Some(removed);
        self
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
