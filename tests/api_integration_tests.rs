//! Integration Tests for API Endpoints
//!
//! Drives dispatchers directly, then checks what the exporter reports.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use resilient_cache::{
    api::create_router, AppState, CallDispatcher, CallOptions, DispatchError, DispatcherConfig,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

#[derive(Debug, thiserror::Error)]
#[error("backend unavailable")]
struct Unavailable;

fn config() -> DispatcherConfig {
    DispatcherConfig {
        max_failures: 2,
        max_attempts: 1,
        base_delay_ms: 1,
        timeout_ms: 1_000,
        ..DispatcherConfig::default()
    }
}

fn create_test_state() -> AppState {
    AppState::new([
        Arc::new(CallDispatcher::new("cloud", &config())),
        Arc::new(CallDispatcher::new("database", &config())),
    ])
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn cached_call(dispatcher: &CallDispatcher, operation: &str, value: u32) -> u32 {
    dispatcher
        .invoke(operation, CallOptions::cached(), move || async move {
            Ok::<_, Infallible>(value)
        })
        .await
        .unwrap()
}

async fn failing_call(dispatcher: &CallDispatcher, operation: &str) -> DispatchError<Unavailable> {
    dispatcher
        .invoke::<u32, _, _, _>(operation, CallOptions::new(), || async { Err(Unavailable) })
        .await
        .unwrap_err()
}

// == Health ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router(create_test_state());

    let (status, json) = send(&app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

// == Stats ==

#[tokio::test]
async fn test_stats_reports_every_domain() {
    let state = create_test_state();
    let cloud = state.dispatchers["cloud"].clone();
    let app = create_router(state);

    cached_call(&cloud, "activities.list", 1).await;
    cached_call(&cloud, "activities.list", 1).await;

    let (status, json) = send(&app, "GET", "/stats").await;

    assert_eq!(status, StatusCode::OK);
    let domains = json["domains"].as_array().unwrap();
    assert_eq!(domains.len(), 2);
    assert_eq!(domains[0]["domain"], "cloud");
    assert_eq!(domains[0]["total_calls"], 2);
    assert_eq!(domains[0]["hit_rate"], 0.5);
    assert_eq!(domains[0]["cache"]["total_entries"], 1);
    assert_eq!(domains[1]["domain"], "database");
    assert_eq!(domains[1]["total_calls"], 0);
}

#[tokio::test]
async fn test_domain_stats_per_operation() {
    let state = create_test_state();
    let db = state.dispatchers["database"].clone();
    let app = create_router(state);

    cached_call(&db, "records.query", 1).await;
    failing_call(&db, "records.update").await;

    let (status, json) = send(&app, "GET", "/stats/database").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["domain"], "database");
    assert_eq!(json["metrics"]["total_calls"], 2);
    assert_eq!(json["metrics"]["failure_rate"], 0.5);

    let ops = &json["metrics"]["operations"];
    assert_eq!(ops["records.query"]["successes"], 1);
    assert_eq!(ops["records.update"]["failures"], 1);
    assert_eq!(ops["records.update"]["failure_rate"], 1.0);
}

#[tokio::test]
async fn test_reset_stats() {
    let state = create_test_state();
    let cloud = state.dispatchers["cloud"].clone();
    let app = create_router(state);

    cached_call(&cloud, "activities.list", 1).await;

    let (status, _) = send(&app, "POST", "/stats/cloud/reset").await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, "GET", "/stats/cloud").await;
    assert_eq!(json["metrics"]["total_calls"], 0);
    // Cached results survive a metrics reset
    assert_eq!(json["cache"]["total_entries"], 1);
}

#[tokio::test]
async fn test_unknown_domain_returns_404() {
    let app = create_router(create_test_state());

    let (status, json) = send(&app, "GET", "/stats/mail").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Unknown domain: mail");
}

// == Breakers ==

#[tokio::test]
async fn test_breaker_opens_and_resets() {
    let state = create_test_state();
    let cloud = state.dispatchers["cloud"].clone();
    let app = create_router(state);

    failing_call(&cloud, "instances.start").await;
    failing_call(&cloud, "instances.start").await;
    assert!(failing_call(&cloud, "instances.start").await.is_circuit_open());

    let (status, json) = send(&app, "GET", "/breakers/cloud").await;
    assert_eq!(status, StatusCode::OK);
    let breakers = json["breakers"].as_array().unwrap();
    assert_eq!(breakers.len(), 1);
    assert_eq!(breakers[0]["operation_key"], "instances.start");
    assert_eq!(breakers[0]["state"], "open");
    assert_eq!(breakers[0]["consecutive_failures"], 2);

    let (_, stats) = send(&app, "GET", "/stats").await;
    assert_eq!(stats["domains"][0]["open_breakers"], 1);

    let (status, _) = send(&app, "POST", "/breakers/cloud/instances.start/reset").await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, "GET", "/breakers/cloud").await;
    assert!(json["breakers"].as_array().unwrap().is_empty());

    let (status, json) = send(&app, "POST", "/breakers/cloud/instances.start/reset").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("instances.start"));
}

// == Cache ==

#[tokio::test]
async fn test_clear_cache_by_namespace() {
    let state = create_test_state();
    let cloud = state.dispatchers["cloud"].clone();
    let app = create_router(state);

    cached_call(&cloud, "activities.list", 1).await;
    cached_call(&cloud, "instances.list", 2).await;

    let (status, json) = send(&app, "DELETE", "/cache/cloud?namespace=activities.list").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);

    let (_, json) = send(&app, "DELETE", "/cache/cloud").await;
    assert_eq!(json["removed"], 1);

    let (_, json) = send(&app, "GET", "/stats/cloud").await;
    assert_eq!(json["cache"]["total_entries"], 0);
}

#[tokio::test]
async fn test_clear_cache_empty_namespace_rejected() {
    let app = create_router(create_test_state());

    let (status, json) = send(&app, "DELETE", "/cache/cloud?namespace=").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}
