//! Common utilities for integration tests
//!
//! - unique test keys and prefixes
//! - cache constructors for each backend
//! - event recording

#![allow(dead_code)]

use membrane::{CacheEvent, CacheOptions, EventBus, EventKind, MemoryCache};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Get Redis URL from environment or use default
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Create a test key with unique suffix
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Prefix unique to one test, so networked stores can be shared between runs
pub fn test_prefix() -> String {
    format!("membrane_test_{}", rand::random::<u32>())
}

pub fn options(timeout: Duration) -> CacheOptions {
    CacheOptions::new("test")
        .with_prefix(test_prefix())
        .with_timeout(timeout)
}

/// Memory cache with the default timeout and its own event bus
pub fn memory_cache() -> (MemoryCache, EventBus) {
    let events = EventBus::new();
    let cache = MemoryCache::with_options(options(membrane::DEFAULT_TIMEOUT), events.clone());
    (cache, events)
}

/// Collects every event of one kind
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<CacheEvent>>>,
}

impl Recorder {
    pub fn attach(events: &EventBus, kind: EventKind) -> Self {
        let recorder = Self::default();
        let seen = Arc::clone(&recorder.seen);
        events.on(kind, move |event| seen.lock().push(event.clone()));
        recorder
    }

    pub fn events(&self) -> Vec<CacheEvent> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

/// Behaviour every storing backend must share
///
/// Each check uses its own keys, so they can run against a shared server.
pub mod contract {
    use super::test_key;
    use anyhow::Result;
    use membrane::{CacheBackend, CacheValue};

    pub async fn add_keeps_first_value(cache: &dyn CacheBackend) -> Result<()> {
        let key = test_key("add");
        assert_eq!(cache.add(&key, "v1".into(), None).await?, CacheValue::from("v1"));
        assert_eq!(cache.add(&key, "v2".into(), None).await?, CacheValue::from("v1"));
        assert_eq!(cache.get(&key).await?, Some(CacheValue::from("v1")));
        Ok(())
    }

    pub async fn set_preserves_type(cache: &dyn CacheBackend) -> Result<()> {
        for value in [
            CacheValue::from(5),
            CacheValue::from(-3),
            CacheValue::from(1.5),
            CacheValue::from("frosting"),
            CacheValue::from(true),
        ] {
            let key = test_key("typed");
            assert_eq!(cache.set(&key, value.clone(), None).await?, value);
            assert_eq!(cache.get(&key).await?, Some(value));
        }
        Ok(())
    }

    pub async fn counters(cache: &dyn CacheBackend) -> Result<()> {
        let fresh = test_key("incr");
        assert_eq!(cache.incr(&fresh, None).await?, 1);
        assert_eq!(cache.incr(&fresh, None).await?, 2);

        let key = test_key("decr");
        cache.set(&key, 5.into(), None).await?;
        for expected in (0..5).rev() {
            assert_eq!(cache.decr(&key, None).await?, expected);
        }
        assert_eq!(cache.get(&key).await?, Some(CacheValue::from(0)));

        let up = test_key("incr_from_five");
        cache.set(&up, 5.into(), None).await?;
        for _ in 0..5 {
            cache.incr(&up, None).await?;
        }
        assert_eq!(cache.get(&up).await?, Some(CacheValue::from(10)));
        Ok(())
    }

    pub async fn push_onto_scalar(cache: &dyn CacheBackend) -> Result<()> {
        let key = test_key("push_scalar");
        cache.set(&key, 1.into(), None).await?;
        let list = cache.push(&key, 2.into(), None).await?;
        assert_eq!(list, vec![CacheValue::from(1), CacheValue::from(2)]);
        assert_eq!(cache.get(&key).await?, Some(CacheValue::from(vec![1, 2])));
        Ok(())
    }

    pub async fn pop_matching_keeps_order(cache: &dyn CacheBackend) -> Result<()> {
        let key = test_key("pop_match");
        for n in 1..=4 {
            cache.push(&key, n.into(), None).await?;
        }
        assert_eq!(cache.pop(&key, Some(3.into()), None).await?, Some(CacheValue::from(3)));
        assert_eq!(cache.get(&key).await?, Some(CacheValue::from(vec![1, 2, 4])));

        assert_eq!(cache.pop(&key, Some(9.into()), None).await?, None);
        assert_eq!(cache.get(&key).await?, Some(CacheValue::from(vec![1, 2, 4])));
        Ok(())
    }

    /// Without a match, `pop` takes the most recently pushed element
    pub async fn pop_without_match_is_lifo(cache: &dyn CacheBackend) -> Result<()> {
        let key = test_key("pop_lifo");
        for item in ["a", "b", "c"] {
            cache.push(&key, item.into(), None).await?;
        }
        assert_eq!(cache.pop(&key, None, None).await?, Some(CacheValue::from("c")));
        assert_eq!(cache.pop(&key, None, None).await?, Some(CacheValue::from("b")));
        cache.push(&key, "d".into(), None).await?;
        assert_eq!(cache.get(&key).await?, Some(CacheValue::from(vec!["a", "d"])));
        Ok(())
    }

    /// An emptied list is absence, the same as a key never written
    pub async fn pop_last_element_leaves_key_absent(cache: &dyn CacheBackend) -> Result<()> {
        let key = test_key("pop_last");
        cache.push(&key, "x".into(), None).await?;
        assert_eq!(cache.pop(&key, None, None).await?, Some(CacheValue::from("x")));
        assert!(!cache.has(&key).await?);
        assert_eq!(cache.get(&key).await?, None);

        let empty = test_key("set_empty");
        cache.set(&empty, CacheValue::List(Vec::new()), None).await?;
        assert!(!cache.has(&empty).await?);
        Ok(())
    }

    pub async fn multi_get(cache: &dyn CacheBackend) -> Result<()> {
        let (k1, k2, k3) = (test_key("many"), test_key("many"), test_key("many"));
        cache.set(&k1, 1.into(), None).await?;
        cache.set(&k2, "two".into(), None).await?;

        let values = cache.get_many(&[k1.as_str(), k2.as_str(), k3.as_str()]).await?;
        assert_eq!(values.len(), 3);
        assert_eq!(values.get(&k1), Some(&Some(CacheValue::from(1))));
        assert_eq!(values.get(&k2), Some(&Some(CacheValue::from("two"))));
        assert_eq!(values.get(&k3), Some(&None));
        Ok(())
    }

    pub async fn flush_empties(cache: &dyn CacheBackend) -> Result<()> {
        let key = test_key("flush");
        cache.set(&key, "here".into(), None).await?;
        assert!(cache.has(&key).await?);

        cache.flush().await?;
        assert!(!cache.has(&key).await?);
        assert_eq!(cache.get(&key).await?, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key1 = test_key("user");
        let key2 = test_key("user");
        assert_ne!(key1, key2, "Keys should be unique");
        assert!(key1.starts_with("test_user_"));
    }
}
