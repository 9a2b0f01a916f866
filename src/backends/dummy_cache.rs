//! Dummy Cache - No-Op Backend
//!
//! Accepts every operation and stores nothing. Useful as the default cache in
//! tests and development setups that should run without a cache service.

use crate::config::CacheOptions;
use crate::error::Result;
use crate::traits::CacheBackend;
use crate::value::CacheValue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache that never holds anything
///
/// Writes echo their input back, reads always miss, `incr` answers `1` and
/// `decr` answers `0` as if the counter had just been created.
#[derive(Debug, Clone, Default)]
pub struct DummyCache {
    name: String,
}

impl DummyCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(&CacheOptions::default())
    }

    #[must_use]
    pub fn with_options(options: &CacheOptions) -> Self {
        warn!(cache = %options.name, "Dummy Cache stores nothing, use it for testing only");
        Self {
            name: options.name.clone(),
        }
    }
}

#[async_trait]
impl CacheBackend for DummyCache {
    async fn add(&self, _key: &str, value: CacheValue, _ttl: Option<Duration>) -> Result<CacheValue> {
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        debug!(cache = %self.name, key, "[Dummy] miss");
        Ok(None)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Option<CacheValue>>> {
        Ok(keys.iter().map(|k| ((*k).to_string(), None)).collect())
    }

    async fn set(&self, _key: &str, value: CacheValue, _ttl: Option<Duration>) -> Result<CacheValue> {
        Ok(value)
    }

    async fn incr(&self, _key: &str, _ttl: Option<Duration>) -> Result<i64> {
        Ok(1)
    }

    async fn decr(&self, _key: &str, _ttl: Option<Duration>) -> Result<i64> {
        Ok(0)
    }

    async fn push(&self, _key: &str, value: CacheValue, _ttl: Option<Duration>) -> Result<Vec<CacheValue>> {
        Ok(vec![value])
    }

    async fn pop(
        &self,
        _key: &str,
        _matching: Option<CacheValue>,
        _ttl: Option<Duration>,
    ) -> Result<Option<CacheValue>> {
        Ok(None)
    }

    async fn has(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn touch(&self, _key: &str, _ttl: Option<Duration>) -> Result<bool> {
        Ok(false)
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Dummy"
    }
}
