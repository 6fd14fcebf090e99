//! LRU Tracker Module
//!
//! Keeps cache keys in recency order for eviction.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
///
/// The order is total, so two entries touched within the same millisecond
/// still have a defined eviction order (the earlier touch goes first).
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as most recently used, inserting it if absent.
    pub fn touch(&mut self, key: &str) {
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    // == Retain ==
    /// Keeps only the keys matching `keep`, preserving order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.order.retain(|k| keep(k));
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_new() {
        let lru = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_lru_touch_existing_key_moves_to_front() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.touch("c");
        lru.touch("a");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.evict_oldest(), Some("b".to_string()));
        assert_eq!(lru.evict_oldest(), Some("c".to_string()));
        assert_eq!(lru.evict_oldest(), Some("a".to_string()));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_touch_same_key_multiple_times() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key1");
        lru.touch("key1");

        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.remove("key1");
        lru.remove("nonexistent");

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.evict_oldest(), Some("key2".to_string()));
    }

    #[test]
    fn test_lru_retain_preserves_order() {
        let mut lru = LruTracker::new();

        lru.touch("users:1");
        lru.touch("orders:1");
        lru.touch("users:2");
        lru.retain(|k| !k.starts_with("orders:"));

        assert_eq!(lru.len(), 2);
        assert_eq!(lru.evict_oldest(), Some("users:1".to_string()));
        assert_eq!(lru.evict_oldest(), Some("users:2".to_string()));
    }
}
