//! API Routes
//!
//! Configures the Axum router with all stats exporter endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    breakers_handler, clear_cache_handler, domain_stats_handler, health_handler,
    reset_breaker_handler, reset_stats_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/:domain", get(domain_stats_handler))
        .route("/stats/:domain/reset", post(reset_stats_handler))
        .route("/breakers/:domain", get(breakers_handler))
        .route(
            "/breakers/:domain/:operation/reset",
            post(reset_breaker_handler),
        )
        .route("/cache/:domain", delete(clear_cache_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
