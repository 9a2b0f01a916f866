//! Cache Backend Trait
//!
//! This module defines the operation set every cache backend exposes.
//!
//! # Architecture
//!
//! - `CacheBackend`: the async capability template. Every method has a default
//!   body that fails with [`CacheError::NotImplemented`], so a backend only
//!   overrides what its store can do.
//! - Key namespacing ([`KeyNamer`](crate::KeyNamer)) and value coercion
//!   ([`CacheValue`]) are standalone helpers each backend is given at
//!   construction, not inherited behaviour.
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use membrane::{CacheBackend, CacheValue, Result, async_trait};
//! use std::time::Duration;
//!
//! struct MyCustomCache {
//!     // Your implementation
//! }
//!
//! #[async_trait]
//! impl CacheBackend for MyCustomCache {
//!     async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
//!         // Your implementation
//!     }
//!
//!     async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<CacheValue> {
//!         // Your implementation
//!     }
//!
//!     // anything not overridden rejects with NotImplemented
//!
//!     fn name(&self) -> &'static str {
//!         "MyCustomCache"
//!     }
//! }
//! ```

use crate::error::{CacheError, Result};
use crate::value::CacheValue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::error;

/// Uniform cache operation set
///
/// # Semantics
///
/// - Every `ttl` argument overrides the backend's configured timeout for that
///   single call; `None` uses the configured timeout.
/// - Expired entries are indistinguishable from absent ones.
/// - `add` never overwrites a live value.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to support concurrent access across async tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store `value` only if `key` holds no live value
    ///
    /// # Returns
    ///
    /// * `Ok(value)` - the value now stored: `value` if it was added, otherwise
    ///   the pre-existing value
    async fn add(&self, _key: &str, _value: CacheValue, _ttl: Option<Duration>) -> Result<CacheValue> {
        Err(self.not_implemented("add"))
    }

    /// Get one value
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - live value, typed
    /// * `Ok(None)` - key absent or expired
    async fn get(&self, _key: &str) -> Result<Option<CacheValue>> {
        Err(self.not_implemented("get"))
    }

    /// Get several values at once
    ///
    /// The map holds exactly one entry per requested key, keyed by the raw
    /// (non-namespaced) key.
    async fn get_many(&self, _keys: &[&str]) -> Result<HashMap<String, Option<CacheValue>>> {
        Err(self.not_implemented("get"))
    }

    /// Unconditionally store `value` and reset its ttl
    ///
    /// Returns the stored value.
    async fn set(&self, _key: &str, _value: CacheValue, _ttl: Option<Duration>) -> Result<CacheValue> {
        Err(self.not_implemented("set"))
    }

    /// Increment the counter at `key` by one and return the new value
    ///
    /// An absent key yields `1`.
    async fn incr(&self, _key: &str, _ttl: Option<Duration>) -> Result<i64> {
        Err(self.not_implemented("incr"))
    }

    /// Decrement the counter at `key` by one and return the new value
    async fn decr(&self, _key: &str, _ttl: Option<Duration>) -> Result<i64> {
        Err(self.not_implemented("decr"))
    }

    /// Append `value` to the list at `key`
    ///
    /// An absent key starts an empty list; a scalar becomes a one-element list
    /// first. Returns the resulting list.
    async fn push(&self, _key: &str, _value: CacheValue, _ttl: Option<Duration>) -> Result<Vec<CacheValue>> {
        Err(self.not_implemented("push"))
    }

    /// Remove an element from the list at `key`
    ///
    /// With `matching`, removes one element equal to it; otherwise removes the
    /// last element.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - the removed element
    /// * `Ok(None)` - nothing matched, or the list was empty
    /// * `Err(CacheError::InvalidOperation)` - `key` does not hold a list
    async fn pop(
        &self,
        _key: &str,
        _matching: Option<CacheValue>,
        _ttl: Option<Duration>,
    ) -> Result<Option<CacheValue>> {
        Err(self.not_implemented("pop"))
    }

    /// Whether `key` holds a live value
    async fn has(&self, _key: &str) -> Result<bool> {
        Err(self.not_implemented("has"))
    }

    /// Reset the ttl of `key` without changing its value
    ///
    /// Returns `false` if the key was not live.
    async fn touch(&self, _key: &str, _ttl: Option<Duration>) -> Result<bool> {
        Err(self.not_implemented("touch"))
    }

    /// Remove every entry from the backing store
    async fn flush(&self) -> Result<()> {
        Err(self.not_implemented("flush"))
    }

    /// Release the connection held by this backend
    async fn close(&self) -> Result<()> {
        Err(self.not_implemented("close"))
    }

    /// Get the name of this cache backend
    ///
    /// This is used for logging and debugging purposes.
    fn name(&self) -> &'static str {
        "unknown"
    }

    /// Build the error returned by operations this backend does not provide
    fn not_implemented(&self, operation: &'static str) -> CacheError {
        let err = CacheError::NotImplemented {
            backend: self.name(),
            operation,
        };
        error!(backend = self.name(), operation, "cache error: {err}");
        err
    }
}
