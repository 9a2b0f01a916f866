//! Key Namespacing
//!
//! Every backend passes raw keys through a [`KeyNamer`] exactly once before
//! talking to its store, so several caches can share one physical store
//! without their keys colliding.

use std::fmt;
use std::sync::Arc;

/// Prefix applied when a cache does not configure one
pub const DEFAULT_PREFIX: &str = "membrane";

/// Separator placed between prefix and raw key
pub const DEFAULT_SEPARATOR: &str = "_";

type KeyFn = dyn Fn(&str, &str) -> String + Send + Sync;

/// Deterministic `prefix + separator + key` namer
///
/// A custom key function receives `(prefix, raw_key)` and replaces the
/// default formatting.
///
/// ```rust
/// use membrane::KeyNamer;
///
/// let namer = KeyNamer::new("app");
/// assert_eq!(namer.key("user:1"), "app_user:1");
///
/// let namer = KeyNamer::custom("app", |prefix, key| format!("{prefix}::{key}"));
/// assert_eq!(namer.key("user:1"), "app::user:1");
/// ```
#[derive(Clone)]
pub struct KeyNamer {
    prefix: String,
    separator: String,
    key_fn: Option<Arc<KeyFn>>,
}

impl KeyNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: DEFAULT_SEPARATOR.to_string(),
            key_fn: None,
        }
    }

    /// Namer using a caller-supplied key function
    pub fn custom<F>(prefix: impl Into<String>, key_fn: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        Self {
            prefix: prefix.into(),
            separator: DEFAULT_SEPARATOR.to_string(),
            key_fn: Some(Arc::new(key_fn)),
        }
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Namespaced form of `raw`
    #[must_use]
    pub fn key(&self, raw: &str) -> String {
        match &self.key_fn {
            Some(key_fn) => key_fn(&self.prefix, raw),
            None => format!("{}{}{}", self.prefix, self.separator, raw),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for KeyNamer {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl fmt::Debug for KeyNamer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyNamer")
            .field("prefix", &self.prefix)
            .field("separator", &self.separator)
            .field("custom", &self.key_fn.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespace() {
        let namer = KeyNamer::default();
        assert_eq!(namer.key("foo"), "membrane_foo");
        assert_eq!(namer.prefix(), DEFAULT_PREFIX);
    }

    #[test]
    fn test_distinct_prefixes_do_not_collide() {
        let a = KeyNamer::new("a");
        let b = KeyNamer::new("b");
        assert_ne!(a.key("foo"), b.key("foo"));
        assert_eq!(KeyNamer::new("a").with_separator(":").key("foo"), "a:foo");
    }
}
