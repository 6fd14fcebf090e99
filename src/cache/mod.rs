//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and LRU eviction.

mod entry;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::TtlCache;

// == Public Constants ==
/// Separates a namespace from the rest of a cache key
pub const NAMESPACE_SEPARATOR: char = ':';

/// Builds a key inside `namespace`.
pub fn namespaced_key(namespace: &str, key: &str) -> String {
    format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, key)
}
