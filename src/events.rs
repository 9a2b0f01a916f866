//! Cache Events
//!
//! A process-wide notification channel so configuration problems and backend
//! errors can be observed without holding a reference to the backend that
//! produced them.
//!
//! Two ways to listen:
//! - callbacks registered with [`EventBus::on`] / [`EventBus::once`], run
//!   synchronously by [`EventBus::emit`]
//! - an async stream from [`EventBus::subscribe`] (tokio broadcast)
//!
//! ```rust
//! use membrane::{CacheEvent, EventBus, EventKind};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let events = EventBus::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! events.on(EventKind::Flush, move |_| {
//!     counter.fetch_add(1, Ordering::Relaxed);
//! });
//!
//! events.emit(&CacheEvent::Flush { cache: "default".into() });
//! assert_eq!(seen.load(Ordering::Relaxed), 1);
//! ```

use crate::error::{CacheError, ErrorKind};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel behind [`EventBus::subscribe`]
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something that happened to a cache
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// A backend or the registry reported an error
    Error {
        /// Cache name, or backend name when no cache name is known
        source: String,
        kind: ErrorKind,
        code: &'static str,
        message: String,
    },
    /// A backend finished connecting
    Connect { cache: String, backend: &'static str },
    /// A backend was flushed
    Flush { cache: String },
    /// A backend was closed
    Close { cache: String },
}

impl CacheEvent {
    /// Error event describing `error`
    pub fn error(source: impl Into<String>, error: &CacheError) -> Self {
        Self::Error {
            source: source.into(),
            kind: error.kind(),
            code: error.code(),
            message: error.to_string(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Error { .. } => EventKind::Error,
            Self::Connect { .. } => EventKind::Connect,
            Self::Flush { .. } => EventKind::Flush,
            Self::Close { .. } => EventKind::Close,
        }
    }
}

/// Event names listeners can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Error,
    Connect,
    Flush,
    Close,
}

/// Handle returned by [`EventBus::on`], used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    handler: Handler,
}

struct EventBusInner {
    listeners: RwLock<Vec<Listener>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<CacheEvent>,
}

/// Cloneable event emitter shared by the registry and its backends
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(EventBusInner {
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                sender,
            }),
        }
    }

    /// Run `handler` every time an event of `kind` is emitted
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(handler))
    }

    /// Same as [`EventBus::on`]
    pub fn add_listener<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.on(kind, handler)
    }

    /// Run `handler` for the next event of `kind` only
    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(handler))
    }

    fn register(&self, kind: EventKind, once: bool, handler: Handler) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.write().push(Listener {
            id,
            kind,
            once,
            handler,
        });
        id
    }

    /// Remove one listener; returns `false` if it was already gone
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Remove every listener for `kind`, or all listeners when `kind` is `None`
    pub fn remove_all_listeners(&self, kind: Option<EventKind>) {
        let mut listeners = self.inner.listeners.write();
        match kind {
            Some(kind) => listeners.retain(|l| l.kind != kind),
            None => listeners.clear(),
        }
    }

    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .read()
            .iter()
            .filter(|l| l.kind == kind)
            .count()
    }

    /// Async stream of every emitted event
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.sender.subscribe()
    }

    /// Deliver `event` to listeners and subscribers
    ///
    /// Returns `true` if at least one callback listener handled it.
    pub fn emit(&self, event: &CacheEvent) -> bool {
        let kind = event.kind();

        // handlers run outside the lock so they may register or remove listeners
        let handlers: Vec<Handler> = {
            let mut listeners = self.inner.listeners.write();
            let handlers = listeners
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| Arc::clone(&l.handler))
                .collect();
            listeners.retain(|l| !(l.once && l.kind == kind));
            handlers
        };

        for handler in &handlers {
            handler(event);
        }

        // no subscribers is not an error
        let _ = self.inner.sender.send(event.clone());

        !handlers.is_empty()
    }

    /// Emit an error event for `error`
    pub fn emit_error(&self, source: &str, error: &CacheError) -> bool {
        self.emit(&CacheEvent::error(source, error))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.inner.listeners.read().len())
            .field("subscribers", &self.inner.sender.receiver_count())
            .finish()
    }
}
