//! API Handlers
//!
//! HTTP request handlers for each stats exporter endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::config::Config;
use crate::dispatcher::CallDispatcher;
use crate::error::{ApiError, Result};
use crate::models::{
    ActionResponse, BreakersResponse, DomainStatsResponse, DomainSummary, HealthResponse,
    StatsResponse,
};
use crate::resilience::BreakerState;

/// Application state shared across all handlers.
///
/// Holds one dispatcher per resource domain, keyed by domain name.
#[derive(Clone, Default)]
pub struct AppState {
    pub dispatchers: Arc<BTreeMap<String, Arc<CallDispatcher>>>,
}

impl AppState {
    /// Creates a new AppState from already-built dispatchers.
    pub fn new<I>(dispatchers: I) -> Self
    where
        I: IntoIterator<Item = Arc<CallDispatcher>>,
    {
        let dispatchers = dispatchers
            .into_iter()
            .map(|d| (d.name().to_string(), d))
            .collect();
        Self {
            dispatchers: Arc::new(dispatchers),
        }
    }

    /// Builds one dispatcher per configured domain.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config
                .domains
                .iter()
                .map(|domain| Arc::new(CallDispatcher::new(domain.clone(), &config.dispatcher))),
        )
    }

    /// Looks up the dispatcher for `domain`.
    pub fn dispatcher(&self, domain: &str) -> Result<&Arc<CallDispatcher>> {
        self.dispatchers
            .get(domain)
            .ok_or_else(|| ApiError::UnknownDomain(domain.to_string()))
    }
}

/// Query string for DELETE /cache/:domain
#[derive(Debug, Default, Deserialize)]
pub struct ClearCacheQuery {
    /// Operation whose cached results should be dropped; all when absent
    pub namespace: Option<String>,
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let mut domains = Vec::with_capacity(state.dispatchers.len());

    for (name, dispatcher) in state.dispatchers.iter() {
        let metrics = dispatcher.metrics_snapshot();
        let open_breakers = dispatcher
            .breaker_snapshot()
            .iter()
            .filter(|b| b.state == BreakerState::Open)
            .count();

        domains.push(DomainSummary {
            domain: name.clone(),
            total_calls: metrics.total_calls,
            hit_rate: metrics.hit_rate,
            failure_rate: metrics.failure_rate,
            avg_latency_ms: metrics.avg_latency_ms,
            in_flight: dispatcher.in_flight(),
            open_breakers,
            cache: dispatcher.cache_stats().await.into(),
        });
    }

    Json(StatsResponse { domains })
}

/// Handler for GET /stats/:domain
pub async fn domain_stats_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<DomainStatsResponse>> {
    let dispatcher = state.dispatcher(&domain)?;

    Ok(Json(DomainStatsResponse {
        domain,
        in_flight: dispatcher.in_flight(),
        max_concurrent: dispatcher.max_concurrent(),
        metrics: dispatcher.metrics_snapshot(),
        cache: dispatcher.cache_stats().await.into(),
    }))
}

/// Handler for POST /stats/:domain/reset
pub async fn reset_stats_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<ActionResponse>> {
    state.dispatcher(&domain)?.reset_stats();
    Ok(Json(ActionResponse::new(format!(
        "Metrics for '{}' reset",
        domain
    ))))
}

/// Handler for GET /breakers/:domain
pub async fn breakers_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<BreakersResponse>> {
    let breakers = state.dispatcher(&domain)?.breaker_snapshot();
    Ok(Json(BreakersResponse { domain, breakers }))
}

/// Handler for POST /breakers/:domain/:operation/reset
pub async fn reset_breaker_handler(
    State(state): State<AppState>,
    Path((domain, operation)): Path<(String, String)>,
) -> Result<Json<ActionResponse>> {
    if !state.dispatcher(&domain)?.reset_breaker(&operation) {
        return Err(ApiError::UnknownOperation(operation));
    }
    Ok(Json(ActionResponse::new(format!(
        "Breaker for '{}' in '{}' closed",
        operation, domain
    ))))
}

/// Handler for DELETE /cache/:domain
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<ClearCacheQuery>,
) -> Result<Json<ActionResponse>> {
    if matches!(query.namespace.as_deref(), Some("")) {
        return Err(ApiError::InvalidRequest(
            "namespace cannot be empty".to_string(),
        ));
    }

    let removed = state
        .dispatcher(&domain)?
        .clear_cache(query.namespace.as_deref())
        .await;

    Ok(Json(
        ActionResponse::new(format!("Cache for '{}' cleared", domain)).with_removed(removed),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
