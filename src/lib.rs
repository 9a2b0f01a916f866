//! Membrane
//!
//! One async cache API over interchangeable backends:
//! - **Memory**: per-instance `DashMap` store with per-key eviction timers
//! - **Redis**: native strings and lists (feature `redis`)
//! - **Memcached**: text values with emulated lists (feature `memcached`)
//! - **Dummy** / **Base**: a no-op cache and a reject-everything template
//!
//! Caches are configured by name, built into a [`CacheRegistry`], and used
//! either by name or through the registry's shortcuts to the default cache.
//!
//! # Quick Start
//!
//! ```rust
//! use membrane::{CacheConfig, CacheRegistry, CacheValue, CachesConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> membrane::Result<()> {
//! let config = CachesConfig::new().with_cache(
//!     "default",
//!     CacheConfig::new("memory").with_prefix("app").with_timeout(Duration::from_secs(60)),
//! );
//! let cache = CacheRegistry::from_config(config).await?;
//!
//! cache.set("user:1", "alice", None).await?;
//! assert_eq!(cache.get("user:1").await?, Some(CacheValue::from("alice")));
//!
//! cache.push("recent", 1, None).await?;
//! cache.push("recent", 2, None).await?;
//! assert_eq!(cache.pop("recent", None, None).await?, Some(CacheValue::from(2)));
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! caller → CacheRegistry → CacheBackend (memory | redis | memcached | dummy | base)
//!                              ↓
//!                    KeyNamer (prefix_key) + CacheValue (typecast)
//! ```
//!
//! Errors are returned as [`CacheError`]; configuration errors, unsupported
//! operations and invalid list operations are also emitted on the registry's
//! [`EventBus`].

pub mod backends;
pub mod builder;
pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod registry;
pub mod traits;
pub mod value;

pub use backends::{BaseCache, DummyCache, MemoryCache};

#[cfg(feature = "redis")]
pub use backends::RedisCache;

#[cfg(feature = "memcached")]
pub use backends::MemcachedCache;

pub use builder::{BackendFactory, BackendFuture, BackendKind, CacheRegistryBuilder, DEFAULT_CACHE_NAME};
pub use config::{CacheConfig, CacheOptions, CachesConfig, Location, ServerLocation, DEFAULT_TIMEOUT};
pub use error::{CacheError, ErrorKind, Result};
pub use events::{CacheEvent, EventBus, EventKind, ListenerId};
pub use keys::{KeyNamer, DEFAULT_PREFIX, DEFAULT_SEPARATOR};
pub use registry::CacheRegistry;
pub use traits::CacheBackend;
pub use value::{split_list, CacheValue, LIST_DELIMITER};

// Re-export async_trait for user convenience
pub use async_trait::async_trait;
