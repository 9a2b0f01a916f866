//! Memory Cache - In-Process Backend
//!
//! A per-instance `DashMap` store with one eviction timer per key.
//! This is the reference implementation of the cache contract: it needs no
//! external service and is what the test suite exercises most.

use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, EventBus};
use crate::traits::CacheBackend;
use crate::value::CacheValue;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Longest ttl an entry can carry; longer ttls are clamped to it
const MAX_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Cache entry with expiration tracking
#[derive(Debug)]
struct MemoryEntry {
    value: CacheValue,
    expires_at: Instant,
    /// Identifies which write armed the eviction timer
    generation: u64,
    eviction: Option<JoinHandle<()>>,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// What a read-modify-write leaves in the slot
enum Write {
    Keep,
    Store(CacheValue),
    Remove,
}

impl Write {
    /// Empty lists are stored as absence
    fn store(value: CacheValue) -> Self {
        match &value {
            CacheValue::List(items) if items.is_empty() => Self::Remove,
            _ => Self::Store(value),
        }
    }
}

impl Drop for MemoryEntry {
    fn drop(&mut self) {
        // replaced, flushed or evicted: the old timer must not fire
        if let Some(handle) = self.eviction.take() {
            handle.abort();
        }
    }
}

/// In-process cache backed by `DashMap`
///
/// **Features**:
/// - Owned, per-instance state: two `MemoryCache` values never share data
/// - Per-key eviction timers, re-armed on every write
/// - Read-modify-write operations (`add`, `incr`, `push`, `pop`, ...) run
///   under the entry lock for their key, so they are linearized per key
///
/// **TTL policy**: every mutating operation, including `incr`, `decr` and
/// `pop`, stores the new value with a fresh ttl. A ttl beyond 30 years is
/// clamped to 30 years.
///
/// An empty list is never stored: popping the last element or setting `[]`
/// removes the key.
///
/// **Example**:
/// ```rust
/// use membrane::backends::MemoryCache;
/// use membrane::{CacheBackend, CacheValue};
///
/// # async fn example() -> membrane::Result<()> {
/// let cache = MemoryCache::new();
///
/// cache.set("user:1", CacheValue::from("alice"), None).await?;
/// assert_eq!(cache.get("user:1").await?, Some(CacheValue::from("alice")));
///
/// assert_eq!(cache.incr("hits", None).await?, 1);
/// # Ok(())
/// # }
/// ```
pub struct MemoryCache {
    entries: Arc<DashMap<String, MemoryEntry>>,
    options: CacheOptions,
    events: EventBus,
    generation: AtomicU64,
}

impl MemoryCache {
    /// Create a memory cache with default options and a private event bus
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(CacheOptions::default(), EventBus::new())
    }

    /// Create a memory cache from resolved options
    #[must_use]
    pub fn with_options(options: CacheOptions, events: EventBus) -> Self {
        info!(
            cache = %options.name,
            prefix = %options.namer.prefix(),
            timeout_ms = options.timeout.as_millis(),
            "Initializing Memory Cache"
        );

        Self {
            entries: Arc::new(DashMap::new()),
            options,
            events,
            generation: AtomicU64::new(0),
        }
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose ttl has passed but whose timer has not fired yet
    ///
    /// Timers normally take care of this; it is only needed when the cache
    /// was written to outside of a tokio runtime.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(count = removed, "[Memory] Cleaned up expired entries");
        }
        removed
    }

    fn new_entry(&self, key: &str, value: CacheValue, ttl: Duration) -> MemoryEntry {
        let ttl = ttl.min(MAX_TTL);
        let now = Instant::now();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        MemoryEntry {
            value,
            expires_at: now.checked_add(ttl).unwrap_or(now + MAX_TTL),
            generation,
            eviction: self.schedule_eviction(key.to_string(), generation, ttl),
        }
    }

    fn schedule_eviction(&self, key: String, generation: u64, ttl: Duration) -> Option<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let entries = Arc::downgrade(&self.entries);

        Some(runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(entries) = entries.upgrade() else {
                return;
            };
            // a later write re-armed its own timer
            if entries
                .remove_if(&key, |_, entry| entry.generation == generation)
                .is_some()
            {
                debug!(key = %key, "[Memory] Evicted expired key");
            }
        }))
    }

    /// Run `f` on the live value at `key` while holding its entry lock
    ///
    /// `f` says what to leave in the slot, plus the operation's result. A
    /// stored value gets a fresh ttl.
    fn modify<T, F>(&self, key: &str, ttl: Duration, f: F) -> Result<T>
    where
        F: FnOnce(Option<&CacheValue>) -> Result<(Write, T)>,
    {
        match self.entries.entry(self.options.namer.key(key)) {
            Entry::Occupied(mut slot) => {
                let live = Some(slot.get()).filter(|e| !e.is_expired()).map(|e| &e.value);
                let (next, out) = f(live)?;
                match next {
                    Write::Keep => {}
                    Write::Store(value) => {
                        let entry = self.new_entry(slot.key(), value, ttl);
                        slot.insert(entry);
                    }
                    Write::Remove => {
                        slot.remove();
                    }
                }
                Ok(out)
            }
            Entry::Vacant(slot) => {
                let (next, out) = f(None)?;
                if let Write::Store(value) = next {
                    let entry = self.new_entry(slot.key(), value, ttl);
                    slot.insert(entry);
                }
                Ok(out)
            }
        }
    }

    fn live_value(&self, namespaced: &str) -> Option<CacheValue> {
        let expired = match self.entries.get(namespaced) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(namespaced, |_, entry| entry.is_expired());
        }
        None
    }

    fn counter(&self, key: &str, ttl: Option<Duration>, delta: i64) -> Result<i64> {
        self.modify(key, self.options.ttl(ttl), |current| {
            let n = current
                .and_then(CacheValue::as_i64)
                .unwrap_or(0)
                .saturating_add(delta);
            Ok((Write::Store(CacheValue::Integer(n)), n))
        })
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn add(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<CacheValue> {
        self.modify(key, self.options.ttl(ttl), |current| match current {
            Some(existing) => Ok((Write::Keep, existing.clone())),
            None => Ok((Write::store(value.clone()), value)),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        Ok(self.live_value(&self.options.namer.key(key)))
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Option<CacheValue>>> {
        Ok(keys
            .iter()
            .map(|key| ((*key).to_string(), self.live_value(&self.options.namer.key(key))))
            .collect())
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<CacheValue> {
        let ttl = self.options.ttl(ttl);
        let namespaced = self.options.namer.key(key);
        if matches!(&value, CacheValue::List(items) if items.is_empty()) {
            self.entries.remove(&namespaced);
            debug!(key = %key, "[Memory] Empty list removes key");
            return Ok(value);
        }
        let entry = self.new_entry(&namespaced, value.clone(), ttl);
        self.entries.insert(namespaced, entry);
        debug!(key = %key, ttl_ms = ttl.as_millis(), "[Memory] Cached key with TTL");
        Ok(value)
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        self.counter(key, ttl, 1)
    }

    async fn decr(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        self.counter(key, ttl, -1)
    }

    async fn push(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<Vec<CacheValue>> {
        self.modify(key, self.options.ttl(ttl), |current| {
            let mut list = current.cloned().map(CacheValue::into_list).unwrap_or_default();
            list.push(value);
            Ok((Write::Store(CacheValue::List(list.clone())), list))
        })
    }

    async fn pop(
        &self,
        key: &str,
        matching: Option<CacheValue>,
        ttl: Option<Duration>,
    ) -> Result<Option<CacheValue>> {
        self.modify(key, self.options.ttl(ttl), |current| {
            let mut items = match current {
                Some(CacheValue::List(items)) => items.clone(),
                Some(other) => return Err(CacheError::invalid_operation("pop", other.type_name())),
                None => return Err(CacheError::invalid_operation("pop", "missing")),
            };
            let removed = match &matching {
                Some(wanted) => items
                    .iter()
                    .position(|item| item == wanted)
                    .map(|idx| items.remove(idx)),
                None => items.pop(),
            };
            Ok((Write::store(CacheValue::List(items)), removed))
        })
        .inspect_err(|err| {
            self.events.emit_error(&self.options.name, err);
        })
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.live_value(&self.options.namer.key(key)).is_some())
    }

    async fn touch(&self, key: &str, ttl: Option<Duration>) -> Result<bool> {
        self.modify(key, self.options.ttl(ttl), |current| {
            Ok(match current {
                Some(value) => (Write::Store(value.clone()), true),
                None => (Write::Keep, false),
            })
        })
    }

    async fn flush(&self) -> Result<()> {
        // dropping the entries aborts their timers
        self.entries.clear();
        debug!(cache = %self.options.name, "[Memory] Flushed");
        self.events.emit(&CacheEvent::Flush {
            cache: self.options.name.clone(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
