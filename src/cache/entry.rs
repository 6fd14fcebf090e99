//! Cache Entry Module
//!
//! Defines a single cached value together with its expiry and access metadata.

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// Timestamps are Unix milliseconds read from the cache's clock.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the entry was (last) written
    pub created_at: u64,
    /// When the entry was last read or written
    pub last_accessed_at: u64,
    /// Lifetime of the entry, measured from `created_at`
    pub ttl_ms: u64,
    /// Number of successful reads
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry written at `now`.
    pub fn new(value: V, ttl_ms: u64, now: u64) -> Self {
        Self {
            value,
            created_at: now,
            last_accessed_at: now,
            ttl_ms,
            access_count: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at time `now`.
    ///
    /// Boundary condition: the entry is still live at exactly
    /// `created_at + ttl_ms` and expired one millisecond later.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > self.ttl_ms
    }

    // == Touch ==
    /// Records a successful read at `now`.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }
}
