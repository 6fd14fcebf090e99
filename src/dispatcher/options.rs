//! Per-call options and cache key derivation.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::cache::namespaced_key;
use crate::resilience::RetryPolicy;

// == Call Options ==
/// How a single dispatched call should be handled.
///
/// Unset fields fall back to the dispatcher's configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Serve from and store into the dispatcher cache
    pub cacheable: bool,
    /// Canonical JSON of the call arguments, part of the cache key
    args: Option<String>,
    /// TTL for the stored result
    pub ttl: Option<Duration>,
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl CallOptions {
    /// Options for an uncached call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a call whose result may be cached.
    pub fn cached() -> Self {
        Self {
            cacheable: true,
            ..Self::default()
        }
    }

    /// Adds the call arguments to the cache key.
    ///
    /// Object keys are sorted, so two argument values that compare equal
    /// always produce the same key.
    pub fn with_args<A>(mut self, args: &A) -> Result<Self, serde_json::Error>
    where
        A: Serialize + ?Sized,
    {
        let value = serde_json::to_value(args)?;
        let mut canonical = String::new();
        write_canonical(&value, &mut canonical);
        self.args = Some(canonical);
        Ok(self)
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    // == Cache Key ==
    /// Key the result is cached under, or None for uncached calls.
    ///
    /// The operation key is the namespace, so clearing that namespace drops
    /// every cached result of the operation.
    pub fn cache_key(&self, operation_key: &str) -> Option<String> {
        if !self.cacheable {
            return None;
        }
        let args = self.args.as_deref().unwrap_or("null");
        Some(namespaced_key(operation_key, args))
    }

    /// `base` with this call's overrides applied.
    pub(crate) fn retry_policy(&self, base: &RetryPolicy) -> RetryPolicy {
        let mut policy = base.clone();
        if let Some(timeout) = self.timeout {
            policy.attempt_timeout = timeout;
        }
        if let Some(max_attempts) = self.max_attempts {
            policy.max_attempts = max_attempts;
        }
        policy
    }
}

/// Serializes `value` as JSON with object keys in sorted order.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_uncached_has_no_key() {
        assert_eq!(CallOptions::new().cache_key("users.get"), None);
    }

    #[test]
    fn test_key_without_args() {
        assert_eq!(
            CallOptions::cached().cache_key("users.get"),
            Some("users.get:null".to_string())
        );
    }

    #[test]
    fn test_key_is_stable_across_map_order() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..20 {
            a.insert(format!("k{}", i), i);
        }
        for i in (0..20).rev() {
            b.insert(format!("k{}", i), i);
        }

        let key_a = CallOptions::cached().with_args(&a).unwrap().cache_key("op");
        let key_b = CallOptions::cached().with_args(&b).unwrap().cache_key("op");
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn test_canonical_nested() {
        let options = CallOptions::cached()
            .with_args(&json!({"b": [1, {"d": true, "c": null}], "a": "x"}))
            .unwrap();

        assert_eq!(
            options.cache_key("op"),
            Some(r#"op:{"a":"x","b":[1,{"c":null,"d":true}]}"#.to_string())
        );
    }

    #[test]
    fn test_different_args_different_keys() {
        let one = CallOptions::cached().with_args(&("user", 1)).unwrap();
        let two = CallOptions::cached().with_args(&("user", 2)).unwrap();
        assert_ne!(one.cache_key("op"), two.cache_key("op"));
    }

    #[test]
    fn test_unserializable_args_are_rejected() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not JSON object keys");

        assert!(CallOptions::cached().with_args(&map).is_err());
    }

    #[test]
    fn test_retry_overrides() {
        let base = RetryPolicy::default();
        let options = CallOptions::new()
            .with_timeout(Duration::from_millis(5))
            .with_max_attempts(7);

        let policy = options.retry_policy(&base);
        assert_eq!(policy.attempt_timeout, Duration::from_millis(5));
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.base_delay, base.base_delay);
    }
}
