//! Integration tests for the Redis backend
//!
//! These need a running Redis (`REDIS_URL`, default `redis://127.0.0.1:6379`):
//! `cargo test --test integration_redis -- --ignored`

#![cfg(feature = "redis")]

mod common;

use common::{contract, options, redis_url, test_key, Recorder};
use membrane::{CacheBackend, CacheError, CacheValue, EventBus, EventKind, RedisCache};
use std::time::Duration;

async fn redis_cache() -> (RedisCache, EventBus) {
    let events = EventBus::new();
    let cache = RedisCache::with_options(
        options(membrane::DEFAULT_TIMEOUT).with_location(redis_url()),
        events.clone(),
    )
    .await
    .expect("Failed to connect to Redis");
    (cache, events)
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_contract() {
    let (cache, _) = redis_cache().await;
    contract::add_keeps_first_value(&cache).await.unwrap();
    contract::set_preserves_type(&cache).await.unwrap();
    contract::counters(&cache).await.unwrap();
    contract::push_onto_scalar(&cache).await.unwrap();
    contract::pop_matching_keeps_order(&cache).await.unwrap();
    contract::pop_last_element_leaves_key_absent(&cache).await.unwrap();
    contract::multi_get(&cache).await.unwrap();
}

/// `pop` without a value removes the last element (LIFO)
#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_pop_without_match_is_lifo() {
    let (cache, _) = redis_cache().await;
    contract::pop_without_match_is_lifo(&cache).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_incr_on_text_reseeds() {
    let (cache, _) = redis_cache().await;
    let key = test_key("incr_text");

    cache.set(&key, "frosting".into(), None).await.unwrap();
    assert_eq!(cache.incr(&key, None).await.unwrap(), 1);
    assert_eq!(cache.decr(&key, None).await.unwrap(), 0);

    cache.set(&key, "icing".into(), None).await.unwrap();
    assert_eq!(cache.decr(&key, None).await.unwrap(), -1);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_pop_on_scalar_is_invalid() {
    let (cache, events) = redis_cache().await;
    let errors = Recorder::attach(&events, EventKind::Error);
    let key = test_key("pop_scalar");

    cache.set(&key, 5.into(), None).await.unwrap();
    let err = cache.pop(&key, None, None).await.unwrap_err();
    assert!(matches!(err, CacheError::InvalidOperation { .. }));
    assert_eq!(errors.len(), 1);
    assert_eq!(cache.get(&key).await.unwrap(), Some(CacheValue::from(5)));
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_ttl_is_applied() {
    let (cache, _) = redis_cache().await;
    let key = test_key("ttl");

    cache
        .set(&key, "soon gone".into(), Some(Duration::from_millis(300)))
        .await
        .unwrap();
    assert!(cache.has(&key).await.unwrap());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(cache.get(&key).await.unwrap(), None);
    assert!(!cache.touch(&key, None).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_close_rejects_later_calls() {
    let (cache, _) = redis_cache().await;
    cache.close().await.unwrap();

    let err = cache.get(&test_key("closed")).await.unwrap_err();
    assert!(matches!(err, CacheError::Closed { backend: "Redis" }));
}

#[tokio::test]
#[ignore = "requires a running Redis server, flushes its database"]
async fn test_flush_empties() {
    let (cache, _) = redis_cache().await;
    contract::flush_empties(&cache).await.unwrap();
}
