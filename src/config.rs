//! Cache Configuration
//!
//! Configuration arrives as a mapping of cache name to [`CacheConfig`], usually
//! deserialized from JSON by the application:
//!
//! ```rust
//! use membrane::CachesConfig;
//!
//! let config = CachesConfig::from_json_str(r#"{
//!     "default": { "backend": "memory", "prefix": "app", "timeout": 60000 },
//!     "sessions": { "backend": "redis", "location": "redis://127.0.0.1:6379/2" },
//!     "pages": {
//!         "backend": "memcached",
//!         "location": ["cache-1:11211", { "host": "cache-2", "port": 11212 }]
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(config.len(), 3);
//! ```
//!
//! Each entry is resolved into [`CacheOptions`] before it is handed to a
//! backend constructor.

use crate::error::Result;
use crate::keys::{KeyNamer, DEFAULT_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default time-to-live applied when neither the cache nor the call sets one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300_000);

/// All configured caches, keyed by cache name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CachesConfig {
    caches: BTreeMap<String, CacheConfig>,
}

impl CachesConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `name -> cache config`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`](crate::CacheError::Config) if the JSON
    /// does not match the expected shape.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add (or replace) a cache entry
    #[must_use]
    pub fn with_cache(mut self, name: impl Into<String>, config: CacheConfig) -> Self {
        self.caches.insert(name.into(), config);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheConfig)> {
        self.caches.iter()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CacheConfig> {
        self.caches.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

impl IntoIterator for CachesConfig {
    type Item = (String, CacheConfig);
    type IntoIter = std::collections::btree_map::IntoIter<String, CacheConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.caches.into_iter()
    }
}

/// Configuration of a single named cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Built-in backend name (`memory`, `redis`, `memcached`, `dummy`, `base`)
    /// or the name of a factory registered on the builder
    pub backend: String,
    /// Where the backing store lives, if it has a location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Key prefix, defaults to [`DEFAULT_PREFIX`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Default time-to-live in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Marks this cache as the registry default
    #[serde(default)]
    pub default: bool,
    /// Backend specific options (e.g. `db` for redis, `username`/`password` for memcached)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl CacheConfig {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            location: None,
            prefix: None,
            timeout: None,
            default: false,
            options: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<Location>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_millis() as u64);
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Mark this cache as the default one
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// Location of a cache server (or servers)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// A URL or `[user:pass@]host[:port]` string; memcached accepts a comma separated list
    Url(String),
    /// Explicit host/port/credentials
    Server(ServerLocation),
    /// Several locations
    Many(Vec<Location>),
}

impl From<&str> for Location {
    fn from(value: &str) -> Self {
        Self::Url(value.to_string())
    }
}

impl From<String> for Location {
    fn from(value: String) -> Self {
        Self::Url(value)
    }
}

impl From<ServerLocation> for Location {
    fn from(value: ServerLocation) -> Self {
        Self::Server(value)
    }
}

/// Host/port/credential form of a [`Location`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerLocation {
    /// Host name, optionally with a `:port` suffix
    #[serde(default, alias = "hostname")]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ServerLocation {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Split `host` into host and port, falling back to `port` then `default_port`
    #[must_use]
    pub fn host_port(&self, default_host: &str, default_port: u16) -> (String, u16) {
        let raw = self.host.as_deref().unwrap_or(default_host);
        let (host, embedded) = split_host_port(raw);
        let port = embedded.or(self.port).unwrap_or(default_port);
        (host.to_string(), port)
    }
}

/// Split `host[:port]`, ignoring a port that does not parse
pub(crate) fn split_host_port(raw: &str) -> (&str, Option<u16>) {
    match raw.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (raw, None),
        },
        None => (raw, None),
    }
}

/// Fully resolved settings handed to a backend constructor
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Name of the cache in the registry
    pub name: String,
    /// Key namespacing
    pub namer: KeyNamer,
    /// Default time-to-live
    pub timeout: Duration,
    /// Store location, backend interprets it
    pub location: Option<Location>,
    /// Backend specific options
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl CacheOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namer: KeyNamer::default(),
            timeout: DEFAULT_TIMEOUT,
            location: None,
            options: serde_json::Map::new(),
        }
    }

    /// Resolve a configuration entry
    pub fn from_config(name: impl Into<String>, config: &CacheConfig) -> Self {
        Self {
            name: name.into(),
            namer: KeyNamer::new(config.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)),
            timeout: config
                .timeout
                .map_or(DEFAULT_TIMEOUT, Duration::from_millis),
            location: config.location.clone(),
            options: config.options.clone(),
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namer = KeyNamer::new(prefix);
        self
    }

    #[must_use]
    pub fn with_key_namer(mut self, namer: KeyNamer) -> Self {
        self.namer = namer;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<Location>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Effective ttl for one call
    #[must_use]
    pub fn ttl(&self, ttl: Option<Duration>) -> Duration {
        ttl.unwrap_or(self.timeout)
    }

    /// Read a string option
    #[must_use]
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(serde_json::Value::as_str)
    }

    /// Read an integer option given either as a number or a numeric string
    #[must_use]
    pub fn option_u64(&self, key: &str) -> Option<u64> {
        match self.options.get(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::new("default")
    }
}
