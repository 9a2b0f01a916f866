//! Cache Registry
//!
//! Holds every configured cache by name and forwards the shortcut methods to
//! the default one.

use crate::builder::CacheRegistryBuilder;
use crate::config::CachesConfig;
use crate::error::{CacheError, Result};
use crate::events::EventBus;
use crate::traits::CacheBackend;
use crate::value::CacheValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Named caches plus a default
///
/// # Example
///
/// ```rust
/// use membrane::{CacheConfig, CacheRegistry, CachesConfig};
///
/// # async fn example() -> membrane::Result<()> {
/// let config = CachesConfig::new()
///     .with_cache("default", CacheConfig::new("memory"))
///     .with_cache("noop", CacheConfig::new("dummy"));
/// let registry = CacheRegistry::from_config(config).await?;
///
/// registry.set("answer", 42, None).await?;
/// assert_eq!(registry.incr("answer", None).await?, 43);
///
/// let noop = registry.cache("noop")?;
/// assert_eq!(noop.get("answer").await?, None);
/// # Ok(())
/// # }
/// ```
pub struct CacheRegistry {
    caches: HashMap<String, Arc<dyn CacheBackend>>,
    default_name: String,
    default: Arc<dyn CacheBackend>,
    events: EventBus,
}

impl CacheRegistry {
    pub(crate) fn new(
        caches: HashMap<String, Arc<dyn CacheBackend>>,
        default_name: String,
        events: EventBus,
    ) -> Result<Self> {
        let default = caches
            .get(&default_name)
            .cloned()
            .ok_or(CacheError::MissingDefault)?;

        Ok(Self {
            caches,
            default_name,
            default,
            events,
        })
    }

    /// Builder with no caches configured
    #[must_use]
    pub fn builder() -> CacheRegistryBuilder {
        CacheRegistryBuilder::new()
    }

    /// Build a registry with the built-in backends only
    ///
    /// # Errors
    ///
    /// See [`CacheRegistryBuilder::build`].
    pub async fn from_config(config: CachesConfig) -> Result<Self> {
        CacheRegistryBuilder::from_config(config).build().await
    }

    /// Look up a cache by name
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ImproperlyConfigured`] if no cache of that name
    /// was registered.
    pub fn cache(&self, name: &str) -> Result<Arc<dyn CacheBackend>> {
        self.caches.get(name).cloned().ok_or_else(|| {
            let err = CacheError::improperly_configured(format!("cache `{name}` is not configured"));
            self.events.emit_error(name, &err);
            err
        })
    }

    #[must_use]
    pub fn default_cache(&self) -> &Arc<dyn CacheBackend> {
        &self.default
    }

    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Names of every registered cache, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.caches.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        self.default.get(key).await
    }

    pub async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Option<CacheValue>>> {
        self.default.get_many(keys).await
    }

    pub async fn set(&self, key: &str, value: impl Into<CacheValue>, ttl: Option<Duration>) -> Result<CacheValue> {
        self.default.set(key, value.into(), ttl).await
    }

    pub async fn add(&self, key: &str, value: impl Into<CacheValue>, ttl: Option<Duration>) -> Result<CacheValue> {
        self.default.add(key, value.into(), ttl).await
    }

    pub async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        self.default.incr(key, ttl).await
    }

    pub async fn decr(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        self.default.decr(key, ttl).await
    }

    pub async fn push(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        ttl: Option<Duration>,
    ) -> Result<Vec<CacheValue>> {
        self.default.push(key, value.into(), ttl).await
    }

    pub async fn pop(
        &self,
        key: &str,
        matching: Option<CacheValue>,
        ttl: Option<Duration>,
    ) -> Result<Option<CacheValue>> {
        self.default.pop(key, matching, ttl).await
    }

    pub async fn has(&self, key: &str) -> Result<bool> {
        self.default.has(key).await
    }

    pub async fn touch(&self, key: &str, ttl: Option<Duration>) -> Result<bool> {
        self.default.touch(key, ttl).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.default.flush().await
    }

    /// Close the default cache
    pub async fn close(&self) -> Result<()> {
        self.default.close().await
    }

    /// Close every registered cache, returning the first error
    pub async fn close_all(&self) -> Result<()> {
        let mut first_error = None;
        for (name, cache) in &self.caches {
            debug!(cache = %name, "Closing cache");
            if let Err(err) = cache.close().await {
                self.events.emit_error(name, &err);
                first_error.get_or_insert(err);
            }
        }
        info!(cache_count = self.caches.len(), "Cache registry closed");
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.names())
            .field("default", &self.default_name)
            .finish_non_exhaustive()
    }
}
