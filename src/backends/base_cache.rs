//! Base Cache - Capability Template
//!
//! A backend that supports nothing. Every operation fails with
//! [`CacheError::NotImplemented`] and reports the failure on the event bus, so
//! a misconfigured `backend: "base"` shows up in error listeners instead of
//! failing silently at the call site only.

use crate::config::CacheOptions;
use crate::error::CacheError;
use crate::events::EventBus;
use crate::traits::CacheBackend;
use async_trait::async_trait;
use tracing::error;

#[derive(Debug, Clone)]
pub struct BaseCache {
    name: String,
    events: EventBus,
}

impl BaseCache {
    #[must_use]
    pub fn with_options(options: &CacheOptions, events: EventBus) -> Self {
        Self {
            name: options.name.clone(),
            events,
        }
    }
}

#[async_trait]
impl CacheBackend for BaseCache {
    fn name(&self) -> &'static str {
        "Base"
    }

    fn not_implemented(&self, operation: &'static str) -> CacheError {
        let err = CacheError::NotImplemented {
            backend: self.name(),
            operation,
        };
        error!(cache = %self.name, operation, "cache error: {err}");
        self.events.emit_error(&self.name, &err);
        err
    }
}
