//! API Module
//!
//! HTTP handlers and routing for the dispatcher stats exporter.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Metrics and cache statistics for every domain
//! - `GET /stats/:domain` - Metrics for one domain, per operation
//! - `POST /stats/:domain/reset` - Zero a domain's metrics
//! - `GET /breakers/:domain` - Circuit breaker states
//! - `POST /breakers/:domain/:operation/reset` - Close one breaker
//! - `DELETE /cache/:domain` - Clear cached results (`?namespace=` for one operation)

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
