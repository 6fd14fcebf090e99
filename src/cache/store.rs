//! TTL Cache Module
//!
//! Main cache engine combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::HashMap;

use crate::cache::{CacheEntry, CacheStats, LruTracker, NAMESPACE_SEPARATOR};
use crate::clock::{SharedClock, SystemClock};
use std::sync::Arc;

// == TTL Cache ==
/// Size-bounded key/value cache with per-entry TTL and LRU eviction.
///
/// Keys may be grouped into namespaces by prefixing them with
/// `"{namespace}:"`; see [`TtlCache::clear`].
#[derive(Debug)]
pub struct TtlCache<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// TTL applied when `set` is called without one
    default_ttl_ms: u64,
    clock: SharedClock,
}

impl<V: Clone> TtlCache<V> {
    // == Constructor ==
    /// Creates a cache using the system clock.
    ///
    /// A `max_entries` of 0 is treated as 1.
    pub fn new(max_entries: usize, default_ttl_ms: u64) -> Self {
        Self::with_clock(max_entries, default_ttl_ms, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(max_entries: usize, default_ttl_ms: u64, clock: SharedClock) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            default_ttl_ms,
            clock,
        }
    }

    // == Set ==
    /// Stores a value, overwriting any existing entry and restarting its TTL.
    ///
    /// If the cache is full and `key` is new, the least recently used entry
    /// is evicted first.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl_ms: Option<u64>) {
        let key = key.into();
        let now = self.clock.now_ms();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            if let Some(evicted_key) = self.lru.evict_oldest() {
                self.entries.remove(&evicted_key);
                self.stats.record_eviction();
            }
        }

        let entry = CacheEntry::new(value, ttl_ms.unwrap_or(self.default_ttl_ms), now);
        self.entries.insert(key.clone(), entry);
        self.lru.touch(&key);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns the value if present and not expired.
    ///
    /// Expired entries are removed on access and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let value = self.lookup(key);
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    /// Like [`get`](Self::get), but leaves hit and miss counters alone.
    ///
    /// For a second read of a key whose first read was already counted.
    /// Recency is still updated and expired entries are still removed.
    pub fn get_uncounted(&mut self, key: &str) -> Option<V> {
        self.lookup(key)
    }

    // == Peek ==
    /// Returns a live entry without updating recency or statistics.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        let now = self.clock.now_ms();
        self.entries.get(key).filter(|entry| !entry.is_expired(now))
    }

    // == Delete ==
    /// Removes an entry. Returns true if one was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    // == Clear ==
    /// Removes every entry, or only those in `namespace`.
    ///
    /// A key is in `namespace` when it starts with `"{namespace}:"`. Matching
    /// is by prefix only, so namespace `users` also covers `users:get:...`
    /// when an operation key itself contains the separator.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&mut self, namespace: Option<&str>) -> usize {
        let removed = match namespace {
            None => {
                let count = self.entries.len();
                self.entries.clear();
                self.lru.clear();
                count
            }
            Some(ns) => {
                let prefix = format!("{}{}", ns, NAMESPACE_SEPARATOR);
                let before = self.entries.len();
                self.entries.retain(|key, _| !key.starts_with(&prefix));
                self.lru.retain(|key| !key.starts_with(&prefix));
                before - self.entries.len()
            }
        };

        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Sweep ==
    /// Removes all expired entries. Returns the number removed.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove_entry(key);
        }

        self.stats.record_expirations(expired_keys.len());
        expired_keys.len()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();

        if self.entries.get(key)?.is_expired(now) {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.touch(now);
        let value = entry.value.clone();
        self.lru.touch(key);
        Some(value)
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }
}
