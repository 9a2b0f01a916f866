//! Cache Errors
//!
//! Every fallible cache operation returns [`CacheError`]. Each variant maps to a
//! stable [`ErrorKind`] and a string code so callers (and event listeners) can
//! branch on the failure without matching on messages.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, CacheError>;

/// Broad classification of a [`CacheError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation is not provided by the backend
    NotImplemented,
    /// List-only operation invoked on a non-list value
    InvalidOperation,
    /// Registry or backend configuration problem
    ImproperlyConfigured,
    /// Backend was closed with `close()`
    Closed,
    /// Failure reported by the underlying store or client
    Backend,
}

impl ErrorKind {
    /// Lower-case name used in log lines and events
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotImplemented => "not_implemented",
            Self::InvalidOperation => "invalid_operation",
            Self::ImproperlyConfigured => "improperly_configured",
            Self::Closed => "closed",
            Self::Backend => "backend",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by cache backends and the cache registry
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend does not implement the requested operation
    #[error("{backend} cache backend does not implement {operation}()")]
    NotImplemented {
        backend: &'static str,
        operation: &'static str,
    },

    /// A list operation was applied to something that is not a list
    #[error("can not call {operation} on {found} values")]
    InvalidOperation {
        operation: &'static str,
        found: String,
    },

    /// Configuration is missing or inconsistent
    #[error("improperly configured: {0}")]
    ImproperlyConfigured(String),

    /// No cache was marked as the default one
    #[error("no default cache defined")]
    MissingDefault,

    /// Operation attempted after `close()`
    #[error("{backend} cache backend is closed")]
    Closed { backend: &'static str },

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[cfg(feature = "memcached")]
    #[error("memcached error: {0}")]
    Memcached(#[from] memcache::MemcacheError),

    /// A blocking client call panicked or was cancelled
    #[error("cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Configuration could not be parsed
    #[error("invalid cache configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl CacheError {
    /// Build an [`CacheError::InvalidOperation`] for `operation` on a value of type `found`
    pub fn invalid_operation(operation: &'static str, found: impl Into<String>) -> Self {
        Self::InvalidOperation {
            operation,
            found: found.into(),
        }
    }

    /// Build an [`CacheError::ImproperlyConfigured`] from any message
    pub fn improperly_configured(message: impl Into<String>) -> Self {
        Self::ImproperlyConfigured(message.into())
    }

    /// Classification of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            Self::ImproperlyConfigured(_) | Self::MissingDefault | Self::Config(_) => {
                ErrorKind::ImproperlyConfigured
            }
            Self::Closed { .. } => ErrorKind::Closed,
            #[cfg(feature = "redis")]
            Self::Redis(_) => ErrorKind::Backend,
            #[cfg(feature = "memcached")]
            Self::Memcached(_) => ErrorKind::Backend,
            Self::Task(_) => ErrorKind::Backend,
        }
    }

    /// Stable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotImplemented { .. } => "ENOTIMPLEMENTED",
            Self::InvalidOperation { .. } => "ECACHEVAL",
            Self::ImproperlyConfigured(_) => "ECACHE",
            Self::MissingDefault => "ECACHEDEFAULT",
            Self::Config(_) => "ECACHECONFIG",
            Self::Closed { .. } => "ECACHECLOSED",
            #[cfg(feature = "redis")]
            Self::Redis(_) => "ECACHEBACKEND",
            #[cfg(feature = "memcached")]
            Self::Memcached(_) => "ECACHEBACKEND",
            Self::Task(_) => "ECACHEBACKEND",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_codes() {
        let err = CacheError::invalid_operation("pop", "integer");
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(err.code(), "ECACHEVAL");
        assert_eq!(err.to_string(), "can not call pop on integer values");

        let err = CacheError::MissingDefault;
        assert_eq!(err.kind(), ErrorKind::ImproperlyConfigured);
        assert_eq!(err.code(), "ECACHEDEFAULT");

        let err = CacheError::NotImplemented {
            backend: "Base",
            operation: "get",
        };
        assert_eq!(err.kind().as_str(), "not_implemented");
    }
}
