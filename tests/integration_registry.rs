//! Integration tests for registry construction and the default-cache shortcuts

mod common;

use common::{test_key, Recorder};
use membrane::{
    CacheBackend, CacheConfig, CacheError, CacheEvent, CacheOptions, CacheRegistry, CacheRegistryBuilder,
    CacheValue, CachesConfig, ErrorKind, EventBus, EventKind, MemoryCache,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_registry_from_json() {
    let config = CachesConfig::from_json_str(
        r#"{
            "default": { "backend": "memory", "prefix": "app", "timeout": 60000 },
            "noop": { "backend": "dummy" }
        }"#,
    )
    .unwrap();

    let registry = CacheRegistry::from_config(config).await.unwrap();
    assert_eq!(registry.default_name(), "default");
    assert_eq!(registry.names(), vec!["default", "noop"]);

    let key = test_key("shortcut");
    registry.set(&key, 5, None).await.unwrap();
    assert_eq!(registry.get(&key).await.unwrap(), Some(CacheValue::from(5)));
    assert_eq!(registry.incr(&key, None).await.unwrap(), 6);
    assert_eq!(registry.decr(&key, None).await.unwrap(), 5);
    assert!(registry.has(&key).await.unwrap());

    let noop = registry.cache("noop").unwrap();
    assert_eq!(noop.name(), "Dummy");
    assert_eq!(noop.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_shortcuts_cover_every_operation() {
    let registry = CacheRegistryBuilder::new()
        .with_cache("default", CacheConfig::new("memory"))
        .build()
        .await
        .unwrap();

    let list = test_key("list");
    registry.push(&list, "a", None).await.unwrap();
    registry.push(&list, "b", None).await.unwrap();
    assert_eq!(
        registry.pop(&list, Some("a".into()), None).await.unwrap(),
        Some(CacheValue::from("a"))
    );

    let key = test_key("add");
    assert_eq!(registry.add(&key, 1, None).await.unwrap(), CacheValue::from(1));
    assert_eq!(registry.add(&key, 2, None).await.unwrap(), CacheValue::from(1));
    assert!(registry.touch(&key, Some(Duration::from_secs(5))).await.unwrap());

    let many = registry.get_many(&[key.as_str(), list.as_str()]).await.unwrap();
    assert_eq!(many.get(&key), Some(&Some(CacheValue::from(1))));
    assert_eq!(many.get(&list), Some(&Some(CacheValue::from(vec!["b"]))));

    registry.flush().await.unwrap();
    assert!(!registry.has(&key).await.unwrap());
    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_default_is_improperly_configured() {
    let err = CacheRegistryBuilder::new()
        .with_cache("sessions", CacheConfig::new("memory"))
        .build()
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::MissingDefault));
    assert_eq!(err.kind(), ErrorKind::ImproperlyConfigured);
}

#[tokio::test]
async fn test_empty_config_is_improperly_configured() {
    let err = CacheRegistry::from_config(CachesConfig::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImproperlyConfigured);
}

#[tokio::test]
async fn test_several_defaults_are_rejected() {
    let err = CacheRegistryBuilder::new()
        .with_cache("default", CacheConfig::new("memory"))
        .with_cache("other", CacheConfig::new("memory").as_default())
        .build()
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::ImproperlyConfigured(_)));
    assert_eq!(err.kind(), ErrorKind::ImproperlyConfigured);
}

#[tokio::test]
async fn test_unknown_cache_name_is_improperly_configured() {
    let registry = CacheRegistryBuilder::new()
        .with_cache("default", CacheConfig::new("memory"))
        .build()
        .await
        .unwrap();

    let err = registry.cache("nope").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::ImproperlyConfigured);
}

#[tokio::test]
async fn test_unknown_backend_is_skipped_and_reported() {
    let builder = CacheRegistryBuilder::new()
        .with_cache("default", CacheConfig::new("memory"))
        .with_cache("broken", CacheConfig::new("mongo"));
    let errors = Recorder::attach(builder.events(), EventKind::Error);

    let registry = builder.build().await.unwrap();
    assert_eq!(registry.names(), vec!["default"]);

    match errors.events().as_slice() {
        [CacheEvent::Error { source, kind, .. }] => {
            assert_eq!(source, "broken");
            assert_eq!(*kind, ErrorKind::ImproperlyConfigured);
        }
        other => panic!("expected one error event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_default_backend_fails_build() {
    let builder = CacheRegistryBuilder::new().with_cache("default", CacheConfig::new("mongo"));
    let errors = Recorder::attach(builder.events(), EventKind::Error);

    let err = builder.build().await.unwrap_err();
    assert!(matches!(err, CacheError::MissingDefault));
    // one for the skipped backend, one for the missing default
    assert_eq!(errors.len(), 2);
}

#[tokio::test]
async fn test_registered_factory_is_used() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);

    let registry = CacheRegistryBuilder::new()
        .with_cache(
            "default",
            CacheConfig::new("custom").with_prefix("custom").with_timeout(Duration::from_secs(1)),
        )
        .register_backend("custom", move |options: CacheOptions, events: EventBus| {
            counter.fetch_add(1, Ordering::Relaxed);
            async move {
                assert_eq!(options.name, "default");
                assert_eq!(options.namer.prefix(), "custom");
                assert_eq!(options.timeout, Duration::from_secs(1));
                let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::with_options(options, events));
                Ok::<_, CacheError>(cache)
            }
        })
        .build()
        .await
        .unwrap();

    assert_eq!(built.load(Ordering::Relaxed), 1);
    assert_eq!(registry.default_cache().name(), "Memory");
    registry.set("k", "v", None).await.unwrap();
    assert_eq!(registry.get("k").await.unwrap(), Some(CacheValue::from("v")));
}

#[tokio::test]
async fn test_base_backend_rejects_and_reports() {
    let builder = CacheRegistryBuilder::new().with_cache("default", CacheConfig::new("base"));
    let errors = Recorder::attach(builder.events(), EventKind::Error);
    let registry = builder.build().await.unwrap();

    let err = registry.get("anything").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn test_events_reach_subscribers() {
    let registry = CacheRegistryBuilder::new()
        .with_cache("default", CacheConfig::new("memory"))
        .build()
        .await
        .unwrap();
    let mut rx = registry.events().subscribe();

    registry.flush().await.unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        CacheEvent::Flush {
            cache: "default".into()
        }
    );
}
