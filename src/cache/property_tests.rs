//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check TTL, overwrite, capacity and LRU behavior against
//! arbitrary operation sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::clock::ManualClock;

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_DEFAULT_TTL: u64 = 300_000;

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}"
}

fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Advance { ms: u64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
        (0u64..200).prop_map(|ms| CacheOp::Advance { ms }),
    ]
}

fn manual_cache(max_entries: usize, ttl: u64) -> (TtlCache<String>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    (TtlCache::with_clock(max_entries, ttl, clock.clone()), clock)
}

fn unique(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses reported by stats match what the reads observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let (mut cache, clock) = manual_cache(TEST_MAX_ENTRIES, 100);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => cache.set(key, value, None),
                CacheOp::Get { key } => match cache.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                }
                CacheOp::Advance { ms } => clock.advance(ms),
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, cache.len());
    }

    // Reads before the TTL elapses see the value; reads after do not.
    #[test]
    fn prop_ttl_window(
        key in valid_key_strategy(),
        value in valid_value_strategy(),
        ttl in 1u64..10_000,
        before in 0u64..10_000,
        after in 1u64..10_000,
    ) {
        let (mut cache, clock) = manual_cache(TEST_MAX_ENTRIES, TEST_DEFAULT_TTL);
        cache.set(key.clone(), value.clone(), Some(ttl));

        clock.set(before.min(ttl));
        prop_assert_eq!(cache.get(&key), Some(value));

        clock.set(ttl + after);
        prop_assert_eq!(cache.get(&key), None);
    }

    // A second set wins and restarts the TTL window.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy(),
        elapsed in 1u64..1_000,
    ) {
        let (mut cache, clock) = manual_cache(TEST_MAX_ENTRIES, 1_000);

        cache.set(key.clone(), value1, None);
        clock.advance(elapsed);
        cache.set(key.clone(), value2.clone(), None);
        clock.advance(1_000);

        prop_assert_eq!(cache.get(&key), Some(value2));
        prop_assert_eq!(cache.len(), 1);
    }

    // The cache never holds more than max_entries.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((valid_key_strategy(), valid_value_strategy()), 1..200)
    ) {
        let max_entries = 50;
        let (mut cache, _) = manual_cache(max_entries, TEST_DEFAULT_TTL);

        for (key, value) in entries {
            cache.set(key, value, None);
            prop_assert!(cache.len() <= max_entries);
        }
    }

    // Filling to capacity and adding one more evicts the first key inserted.
    #[test]
    fn prop_lru_eviction_order(
        keys in prop::collection::vec(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy(),
    ) {
        let keys = unique(keys);
        prop_assume!(keys.len() >= 2);
        prop_assume!(!keys.contains(&new_key));

        let (mut cache, _) = manual_cache(keys.len(), TEST_DEFAULT_TTL);
        for key in &keys {
            cache.set(key.clone(), format!("value_{}", key), None);
        }

        cache.set(new_key.clone(), "new".to_string(), None);

        prop_assert!(cache.peek(&keys[0]).is_none());
        prop_assert!(cache.peek(&new_key).is_some());
        for key in keys.iter().skip(1) {
            prop_assert!(cache.peek(key).is_some());
        }
    }

    // Reading the oldest key protects it; the next oldest goes instead.
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::vec(valid_key_strategy(), 3..8),
        new_key in valid_key_strategy(),
    ) {
        let keys = unique(keys);
        prop_assume!(keys.len() >= 3);
        prop_assume!(!keys.contains(&new_key));

        let (mut cache, _) = manual_cache(keys.len(), TEST_DEFAULT_TTL);
        for key in &keys {
            cache.set(key.clone(), format!("value_{}", key), None);
        }

        prop_assert!(cache.get(&keys[0]).is_some());
        cache.set(new_key.clone(), "new".to_string(), None);

        prop_assert!(cache.peek(&keys[0]).is_some());
        prop_assert!(cache.peek(&keys[1]).is_none());
        prop_assert!(cache.peek(&new_key).is_some());
    }
}
