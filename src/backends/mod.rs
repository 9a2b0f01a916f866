//! Cache Backend Implementations
//!
//! # Available Backends
//!
//! ## In-Process
//! - **Memory** - per-instance `DashMap` store with per-key eviction timers
//! - **Dummy** - stores nothing, answers every call
//! - **Base** - rejects every call with `NotImplemented`
//!
//! ## Distributed
//! - **Redis** - native strings and lists (feature: `redis`)
//! - **Memcached** - text values, emulated lists (feature: `memcached`)
//!
//! # Usage
//!
//! ```rust
//! use membrane::backends::MemoryCache;
//! use membrane::{CacheBackend, CacheValue};
//!
//! # async fn example() -> membrane::Result<()> {
//! let cache = MemoryCache::new();
//! cache.push("queue", CacheValue::from("a"), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod base_cache;
pub mod dummy_cache;
pub mod memory_cache;

#[cfg(feature = "redis")]
pub mod redis_cache;

#[cfg(feature = "memcached")]
pub mod memcached_cache;

pub use base_cache::BaseCache;
pub use dummy_cache::DummyCache;
pub use memory_cache::MemoryCache;

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

#[cfg(feature = "memcached")]
pub use memcached_cache::{resolve_servers, MemcachedCache, MemcachedEnv};
