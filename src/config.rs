//! Configuration Module
//!
//! Handles loading dispatcher and exporter settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::resilience::{Backoff, RetryPolicy};

// == Dispatcher Config ==
/// Settings for one call dispatcher. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of cached results
    pub max_entries: usize,
    /// TTL in milliseconds for cached results without an explicit TTL
    pub default_ttl_ms: u64,
    /// Consecutive failures that open an operation's breaker
    pub max_failures: u32,
    /// Milliseconds an open breaker waits before allowing a probe
    pub reset_timeout_ms: u64,
    /// Consecutive probe successes needed to close a tripped breaker
    pub success_threshold: u32,
    /// Attempts per call, including the first
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,
    pub backoff: Backoff,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Calls allowed in flight at once; 0 disables admission control
    pub max_concurrent: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_ms: 300_000,
            max_failures: 5,
            reset_timeout_ms: 60_000,
            success_threshold: 1,
            max_attempts: 3,
            base_delay_ms: 1_000,
            backoff: Backoff::Linear,
            timeout_ms: 10_000,
            max_concurrent: 10,
        }
    }
}

impl DispatcherConfig {
    /// Loads dispatcher settings from the environment.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` (default: 1000)
    /// - `DEFAULT_TTL_MS` (default: 300000)
    /// - `MAX_FAILURES` (default: 5)
    /// - `RESET_TIMEOUT_MS` (default: 60000)
    /// - `SUCCESS_THRESHOLD` (default: 1)
    /// - `MAX_ATTEMPTS` (default: 3)
    /// - `BASE_DELAY_MS` (default: 1000)
    /// - `BACKOFF` - `linear` or `exponential` (default: linear)
    /// - `TIMEOUT_MS` (default: 10000)
    /// - `MAX_CONCURRENT` (default: 10, 0 = unbounded)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            default_ttl_ms: env_or("DEFAULT_TTL_MS", defaults.default_ttl_ms),
            max_failures: env_or("MAX_FAILURES", defaults.max_failures),
            reset_timeout_ms: env_or("RESET_TIMEOUT_MS", defaults.reset_timeout_ms),
            success_threshold: env_or("SUCCESS_THRESHOLD", defaults.success_threshold),
            max_attempts: env_or("MAX_ATTEMPTS", defaults.max_attempts),
            base_delay_ms: env_or("BASE_DELAY_MS", defaults.base_delay_ms),
            backoff: env_or("BACKOFF", defaults.backoff),
            timeout_ms: env_or("TIMEOUT_MS", defaults.timeout_ms),
            max_concurrent: env_or("MAX_CONCURRENT", defaults.max_concurrent),
        }
    }

    /// Retry policy described by these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.timeout_ms),
        )
        .with_backoff(self.backoff)
    }
}

// == Server Config ==
/// Settings for the stats exporter binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings shared by every domain's dispatcher
    pub dispatcher: DispatcherConfig,
    /// One dispatcher is built per domain name
    pub domains: Vec<String>,
    /// HTTP server port
    pub server_port: u16,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - all of [`DispatcherConfig::from_env`]
    /// - `DOMAINS` - Comma-separated domain names (default: cloud,database)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let domains = env::var("DOMAINS")
            .ok()
            .map(|v| parse_domains(&v))
            .filter(|d| !d.is_empty())
            .unwrap_or(defaults.domains);

        Self {
            dispatcher: DispatcherConfig::from_env(),
            domains,
            server_port: env_or("SERVER_PORT", defaults.server_port),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            domains: vec!["cloud".to_string(), "database".to_string()],
            server_port: 3000,
            sweep_interval: 60,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_domains(raw: &str) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !domains.iter().any(|d| d == name) {
            domains.push(name.to_string());
        }
    }
    domains
}
