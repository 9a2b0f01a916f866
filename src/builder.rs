//! Cache Registry Builder
//!
//! Turns a [`CachesConfig`] into a [`CacheRegistry`], resolving each entry's
//! `backend` string to a built-in backend or to a factory registered by the
//! caller.
//!
//! # Example: From Configuration
//!
//! ```rust
//! use membrane::{CacheRegistryBuilder, CachesConfig};
//!
//! # async fn example() -> membrane::Result<()> {
//! let config = CachesConfig::from_json_str(
//!     r#"{ "default": { "backend": "memory", "prefix": "app", "timeout": 60000 } }"#,
//! )?;
//!
//! let registry = CacheRegistryBuilder::from_config(config).build().await?;
//! registry.set("greeting", "hello", None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use membrane::{CacheBackend, CacheConfig, CacheRegistryBuilder, CachesConfig};
//! use std::sync::Arc;
//!
//! let config = CachesConfig::new().with_cache("default", CacheConfig::new("mine"));
//!
//! let registry = CacheRegistryBuilder::from_config(config)
//!     .register_backend("mine", |options, events| async move {
//!         Ok(Arc::new(MyCustomCache::new(options, events)) as Arc<dyn CacheBackend>)
//!     })
//!     .build()
//!     .await?;
//! ```

use crate::backends::{BaseCache, DummyCache, MemoryCache};
use crate::config::{CacheConfig, CacheOptions, CachesConfig};
use crate::error::{CacheError, Result};
use crate::events::EventBus;
use crate::registry::CacheRegistry;
use crate::traits::CacheBackend;
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name a cache must have, unless another one is flagged `default`
pub const DEFAULT_CACHE_NAME: &str = "default";

/// Future returned by a [`BackendFactory`]
pub type BackendFuture = BoxFuture<'static, Result<Arc<dyn CacheBackend>>>;

/// Constructor for a backend that is not built into the crate
pub type BackendFactory = Arc<dyn Fn(CacheOptions, EventBus) -> BackendFuture + Send + Sync>;

/// Built-in backends, selected by the `backend` string of a cache config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Memory,
    Redis,
    Memcached,
    Dummy,
    Base,
}

impl BackendKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
            Self::Memcached => "memcached",
            Self::Dummy => "dummy",
            Self::Base => "base",
        }
    }

    /// Construct the backend
    ///
    /// # Errors
    ///
    /// Returns an error if a networked backend cannot connect, or if the crate
    /// was built without that backend's feature.
    pub async fn create(self, options: CacheOptions, events: EventBus) -> Result<Arc<dyn CacheBackend>> {
        let backend: Arc<dyn CacheBackend> = match self {
            Self::Memory => Arc::new(MemoryCache::with_options(options, events)),
            Self::Dummy => Arc::new(DummyCache::with_options(&options)),
            Self::Base => Arc::new(BaseCache::with_options(&options, events)),
            #[cfg(feature = "redis")]
            Self::Redis => Arc::new(crate::backends::RedisCache::with_options(options, events).await?),
            #[cfg(feature = "memcached")]
            Self::Memcached => Arc::new(crate::backends::MemcachedCache::with_options(options, events).await?),
            #[allow(unreachable_patterns)]
            other => {
                return Err(CacheError::improperly_configured(format!(
                    "backend `{}` requires the `{}` feature",
                    other.as_str(),
                    other.as_str()
                )));
            }
        };
        Ok(backend)
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "memcached" => Ok(Self::Memcached),
            "dummy" => Ok(Self::Dummy),
            "base" => Ok(Self::Base),
            other => Err(CacheError::improperly_configured(format!(
                "unknown cache backend `{other}`"
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for [`CacheRegistry`]
///
/// # Default Cache
///
/// Exactly one cache must end up as the default: either the one named
/// `"default"` or the one flagged `default: true`. A cache whose backend cannot
/// be resolved or constructed is skipped and reported as an error event, so it
/// only makes `build()` fail when it was the default.
pub struct CacheRegistryBuilder {
    config: CachesConfig,
    factories: HashMap<String, BackendFactory>,
    instances: Vec<(String, Arc<dyn CacheBackend>, bool)>,
    events: EventBus,
}

impl CacheRegistryBuilder {
    /// Create a builder with no caches configured
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(CachesConfig::new())
    }

    #[must_use]
    pub fn from_config(config: CachesConfig) -> Self {
        Self {
            config,
            factories: HashMap::new(),
            instances: Vec::new(),
            events: EventBus::new(),
        }
    }

    /// Add (or replace) one cache configuration
    #[must_use]
    pub fn with_cache(mut self, name: impl Into<String>, config: CacheConfig) -> Self {
        self.config = self.config.with_cache(name, config);
        self
    }

    /// Make `name` usable as a `backend` string
    ///
    /// Built-in backend names take precedence over registered ones.
    #[must_use]
    pub fn register_backend<F, Fut>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(CacheOptions, EventBus) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn CacheBackend>>> + Send + 'static,
    {
        let factory: BackendFactory = Arc::new(move |options: CacheOptions, events: EventBus| factory(options, events).boxed());
        self.factories.insert(name.into(), factory);
        self
    }

    /// Register an already constructed backend under `name`
    #[must_use]
    pub fn with_instance(mut self, name: impl Into<String>, backend: Arc<dyn CacheBackend>, default: bool) -> Self {
        self.instances.push((name.into(), backend, default));
        self
    }

    /// Use an existing event bus instead of a fresh one
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// The bus the registry and its backends will emit on
    ///
    /// Register listeners here before `build()` to see construction errors.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Construct every configured cache
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::MissingDefault`] if no cache is the default, and
    /// [`CacheError::ImproperlyConfigured`] if more than one is.
    pub async fn build(self) -> Result<CacheRegistry> {
        info!(cache_count = self.config.len() + self.instances.len(), "Building cache registry");

        let mut caches: HashMap<String, Arc<dyn CacheBackend>> = HashMap::new();
        let mut defaults: Vec<String> = Vec::new();

        for (name, config) in self.config.iter() {
            match self.create(name, config).await {
                Ok(backend) => {
                    debug!(cache = %name, backend = backend.name(), "Registered cache");
                    if name == DEFAULT_CACHE_NAME || config.default {
                        defaults.push(name.clone());
                    }
                    caches.insert(name.clone(), backend);
                }
                Err(err) => {
                    warn!(cache = %name, backend = %config.backend, error = %err, "Skipping cache");
                    self.events.emit_error(name, &err);
                }
            }
        }

        for (name, backend, default) in self.instances {
            if (default || name == DEFAULT_CACHE_NAME) && !defaults.contains(&name) {
                defaults.push(name.clone());
            }
            caches.insert(name, backend);
        }

        let default_name = match defaults.as_slice() {
            [one] => one.clone(),
            [] => {
                let err = CacheError::MissingDefault;
                self.events.emit_error("registry", &err);
                return Err(err);
            }
            several => {
                let err = CacheError::improperly_configured(format!(
                    "only one default cache is allowed, found: {}",
                    several.join(", ")
                ));
                self.events.emit_error("registry", &err);
                return Err(err);
            }
        };

        info!(default = %default_name, cache_count = caches.len(), "Cache registry ready");
        CacheRegistry::new(caches, default_name, self.events)
    }

    async fn create(&self, name: &str, config: &CacheConfig) -> Result<Arc<dyn CacheBackend>> {
        let options = CacheOptions::from_config(name, config);

        match config.backend.parse::<BackendKind>() {
            Ok(kind) => kind.create(options, self.events.clone()).await,
            Err(unknown) => match self.factories.get(&config.backend) {
                Some(factory) => factory(options, self.events.clone()).await,
                None => Err(unknown),
            },
        }
    }
}

impl Default for CacheRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!("Redis".parse::<BackendKind>().unwrap(), BackendKind::Redis);
        assert_eq!("memcached".parse::<BackendKind>().unwrap(), BackendKind::Memcached);
        assert_eq!("dummy".parse::<BackendKind>().unwrap(), BackendKind::Dummy);
        assert_eq!("base".parse::<BackendKind>().unwrap(), BackendKind::Base);

        let err = "mongo".parse::<BackendKind>().unwrap_err();
        assert_eq!(err.code(), "ECACHE");
    }

    #[tokio::test]
    async fn test_flagged_default() {
        let registry = CacheRegistryBuilder::new()
            .with_cache("sessions", CacheConfig::new("memory").as_default())
            .with_cache("scratch", CacheConfig::new("dummy"))
            .build()
            .await
            .unwrap();

        assert_eq!(registry.default_name(), "sessions");
        assert_eq!(registry.names().len(), 2);
    }

    #[tokio::test]
    async fn test_instance_can_be_default() {
        let registry = CacheRegistryBuilder::new()
            .with_instance("local", Arc::new(MemoryCache::new()), true)
            .build()
            .await
            .unwrap();

        assert_eq!(registry.default_name(), "local");
        assert_eq!(registry.default_cache().name(), "Memory");
    }
}
