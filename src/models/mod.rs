//! Response models for the stats exporter API
//!
//! This module defines the DTOs (Data Transfer Objects) serialized into
//! HTTP response bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{
    ActionResponse, BreakersResponse, CacheStatsResponse, DomainStatsResponse, DomainSummary,
    HealthResponse, StatsResponse,
};
