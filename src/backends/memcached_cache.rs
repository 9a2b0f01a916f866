//! Memcached Cache - Distributed Cache Backend
//!
//! Memcached only offers atomic `add`/`incr`/`decr` next to plain
//! `get`/`set`/`delete`, so this backend emulates the rest:
//!
//! - every value is stored as ASCII text and re-typed on read
//! - lists are stored joined by `,` and split again on read
//! - `push`/`pop` are a read-modify-write with no compare-and-swap; two
//!   concurrent pushers can lose an element
//!
//! The `memcache` client is blocking, so every call runs on tokio's blocking
//! pool.

use crate::config::{split_host_port, CacheOptions, Location, ServerLocation};
use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, EventBus};
use crate::traits::CacheBackend;
use crate::value::{split_list, CacheValue};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_MEMCACHED_HOST: &str = "localhost";
const DEFAULT_MEMCACHED_PORT: u16 = 11211;

/// Server list and credentials supplied by the environment
///
/// Read from `MEMCACHIER_SERVERS`, `MEMCACHIER_USERNAME` and
/// `MEMCACHIER_PASSWORD`; used when a cache's location does not carry its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemcachedEnv {
    pub servers: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl MemcachedEnv {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            servers: std::env::var("MEMCACHIER_SERVERS").ok(),
            username: std::env::var("MEMCACHIER_USERNAME").ok(),
            password: std::env::var("MEMCACHIER_PASSWORD").ok(),
        }
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    fn pair(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        Some(Self {
            username: username?.to_string(),
            password: password?.to_string(),
        })
    }
}

/// Build `memcache://` URLs for every configured server
///
/// Credentials are taken, in order, from the location string
/// (`user:pass@host:port`), the location object, the cache options
/// (`username`/`password`) and finally the environment. Authenticated servers
/// use the binary protocol, which is the only one memcached supports SASL on.
#[must_use]
pub fn resolve_servers(options: &CacheOptions, env: &MemcachedEnv) -> Vec<String> {
    let fallback = Credentials::pair(options.option_str("username"), options.option_str("password"))
        .or_else(|| Credentials::pair(env.username.as_deref(), env.password.as_deref()));

    let location = options.location.clone().unwrap_or_else(|| {
        Location::Url(
            env.servers
                .clone()
                .unwrap_or_else(|| DEFAULT_MEMCACHED_HOST.to_string()),
        )
    });

    let mut servers = Vec::new();
    collect_servers(&location, fallback.as_ref(), &mut servers);
    servers
}

fn collect_servers(location: &Location, fallback: Option<&Credentials>, out: &mut Vec<String>) {
    match location {
        Location::Url(list) => {
            for entry in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let entry = entry.strip_prefix("memcache://").unwrap_or(entry);
                let (inline, address) = match entry.rsplit_once('@') {
                    Some((auth, address)) => {
                        let (user, pass) = auth.split_once(':').unwrap_or((auth, ""));
                        (Credentials::pair(Some(user), Some(pass)), address)
                    }
                    None => (None, entry),
                };
                let (host, port) = split_host_port(address);
                let host = if host.is_empty() { DEFAULT_MEMCACHED_HOST } else { host };
                out.push(server_url(
                    host,
                    port.unwrap_or(DEFAULT_MEMCACHED_PORT),
                    inline.as_ref().or(fallback),
                ));
            }
        }
        Location::Server(server) => {
            let (host, port) = server.host_port(DEFAULT_MEMCACHED_HOST, DEFAULT_MEMCACHED_PORT);
            let own = own_credentials(server);
            out.push(server_url(&host, port, own.as_ref().or(fallback)));
        }
        Location::Many(items) => {
            for item in items {
                collect_servers(item, fallback, out);
            }
        }
    }
}

fn own_credentials(server: &ServerLocation) -> Option<Credentials> {
    Credentials::pair(server.username.as_deref(), server.password.as_deref())
}

fn server_url(host: &str, port: u16, credentials: Option<&Credentials>) -> String {
    match credentials {
        Some(auth) => format!(
            "memcache://{}:{}@{host}:{port}?protocol=binary",
            auth.username, auth.password
        ),
        None => format!("memcache://{host}:{port}"),
    }
}

/// Memcached expirations are whole seconds and `0` means "never"
fn expiration(ttl: Duration) -> u32 {
    let secs = ttl.as_millis().div_ceil(1000).max(1);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

/// Memcached distributed cache
///
/// **Note**: Unlike Redis, Memcached does not support:
/// - native lists (emulated with comma-joined text)
/// - type introspection (values are re-typed from text)
/// - negative counters (`decr` stops at 0)
///
/// An empty list is stored as absence: popping the last element or setting
/// `[]` deletes the key.
///
/// # Encoding limits
///
/// Lists share the text encoding with scalars, so any text containing `,`
/// reads back as a list: `"a,b"` comes back as `["a", "b"]`, and a
/// one-element list comes back as its scalar.
///
/// # TTL policy
///
/// `incr`/`decr` leave the ttl of a live counter untouched. A counter seeded
/// on a missing key, or reseeded over non-numeric text, gets the call's ttl.
pub struct MemcachedCache {
    /// `None` once `close()` has run
    client: RwLock<Option<Arc<memcache::Client>>>,
    options: CacheOptions,
    events: EventBus,
}

impl MemcachedCache {
    /// Connect to the servers described by `options`
    ///
    /// # Errors
    ///
    /// Returns an error if the Memcached client cannot be created or the
    /// servers do not answer a `version` request.
    pub async fn with_options(options: CacheOptions, events: EventBus) -> Result<Self> {
        let servers = resolve_servers(&options, &MemcachedEnv::from_env());
        info!(cache = %options.name, server_count = servers.len(), "Initializing Memcached Cache");

        let client = tokio::task::spawn_blocking(move || -> Result<memcache::Client> {
            let client = memcache::Client::connect(servers)?;
            let versions = client.version()?;
            debug!(server_count = versions.len(), "[Memcached] version check passed");
            Ok(client)
        })
        .await??;

        info!(cache = %options.name, "Memcached Cache connected successfully");
        events.emit(&CacheEvent::Connect {
            cache: options.name.clone(),
            backend: "Memcached",
        });

        Ok(Self {
            client: RwLock::new(Some(Arc::new(client))),
            options,
            events,
        })
    }

    fn client(&self) -> Result<Arc<memcache::Client>> {
        self.client
            .read()
            .clone()
            .ok_or(CacheError::Closed { backend: "Memcached" })
    }

    /// Run a blocking client call off the async workers
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&memcache::Client) -> Result<T> + Send + 'static,
    {
        let client = self.client()?;
        tokio::task::spawn_blocking(move || f(&client)).await?
    }

    fn expiration(&self, ttl: Option<Duration>) -> u32 {
        expiration(self.options.ttl(ttl))
    }

    async fn counter(&self, key: &str, ttl: Option<Duration>, up: bool) -> Result<i64> {
        let key = self.options.namer.key(key);
        let exp = self.expiration(ttl);
        debug!(key = %key, up, "[Memcached] counter");

        self.run(move |client| {
            let step = |client: &memcache::Client| {
                if up {
                    client.increment(&key, 1)
                } else {
                    client.decrement(&key, 1)
                }
            };

            if let Ok(n) = step(client) {
                return Ok(i64::try_from(n).unwrap_or(i64::MAX));
            }

            match client.get::<String>(&key)? {
                Some(raw) if raw.trim().parse::<u64>().is_err() => {
                    // present but not numeric: counts as 0
                    let seed = i64::from(up);
                    client.set(&key, seed.to_string().as_str(), exp)?;
                    debug!(key = %key, seed, "[Memcached] Reseeded non-numeric counter");
                    return Ok(seed);
                }
                // seeded by a concurrent caller
                Some(_) => {}
                // NOT_STORED comes back as Ok, so a lost race looks like a
                // win; step from 0 either way
                None => {
                    let _ = client.add(&key, "0", exp);
                }
            }
            Ok(i64::try_from(step(client)?).unwrap_or(i64::MAX))
        })
        .await
    }
}

#[async_trait]
impl CacheBackend for MemcachedCache {
    async fn add(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<CacheValue> {
        let key = self.options.namer.key(key);
        let exp = self.expiration(ttl);
        let encoded = value.encode();

        // the ASCII protocol reports NOT_STORED as success, so read back what is live
        let (current, encoded) = self
            .run(move |client| {
                let added = client.add(&key, encoded.as_str(), exp);
                match (added, client.get::<String>(&key)?) {
                    (_, Some(raw)) => Ok((Some(raw), encoded)),
                    (Ok(()), None) => Ok((None, encoded)),
                    (Err(err), None) => Err(err.into()),
                }
            })
            .await?;

        match current {
            Some(raw) if raw != encoded => Ok(CacheValue::decode_delimited(&raw)),
            _ => Ok(value),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let key = self.options.namer.key(key);
        let raw = self
            .run(move |client| Ok(client.get::<String>(&key)?))
            .await?;
        Ok(raw.map(|raw| CacheValue::decode_delimited(&raw)))
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Option<CacheValue>>> {
        let values = try_join_all(keys.iter().map(|key| self.get(key))).await?;
        Ok(keys.iter().map(|k| (*k).to_string()).zip(values).collect())
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<CacheValue> {
        let key = self.options.namer.key(key);
        let exp = self.expiration(ttl);
        let encoded = value.encode();
        debug!(key = %key, ttl_secs = exp, "[Memcached] Cached key with TTL");

        let empty = matches!(&value, CacheValue::List(items) if items.is_empty());
        self.run(move |client| {
            if empty {
                client.delete(&key)?;
            } else {
                client.set(&key, encoded.as_str(), exp)?;
            }
            Ok(())
        })
        .await?;
        Ok(value)
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        self.counter(key, ttl, true).await
    }

    async fn decr(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        self.counter(key, ttl, false).await
    }

    async fn push(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<Vec<CacheValue>> {
        let key = self.options.namer.key(key);
        let exp = self.expiration(ttl);

        self.run(move |client| {
            let mut items = client
                .get::<String>(&key)?
                .map(|raw| split_list(&raw))
                .unwrap_or_default();
            items.push(value);
            let encoded = CacheValue::List(items.clone()).encode();
            client.set(&key, encoded.as_str(), exp)?;
            debug!(key = %key, len = items.len(), "[Memcached] push");
            Ok(items)
        })
        .await
    }

    async fn pop(
        &self,
        key: &str,
        matching: Option<CacheValue>,
        ttl: Option<Duration>,
    ) -> Result<Option<CacheValue>> {
        let key = self.options.namer.key(key);
        let exp = self.expiration(ttl);

        self.run(move |client| {
            // any stored text is list-shaped: a one-element list and a scalar share an encoding
            let raw = client
                .get::<String>(&key)?
                .ok_or_else(|| CacheError::invalid_operation("pop", "missing"))?;
            let mut items = split_list(&raw);

            let removed = match &matching {
                Some(wanted) => {
                    let wanted = wanted.encode();
                    items
                        .iter()
                        .position(|item| item.encode() == wanted)
                        .map(|idx| items.remove(idx))
                }
                None => items.pop(),
            };

            if items.is_empty() {
                client.delete(&key)?;
            } else {
                let encoded = CacheValue::List(items).encode();
                client.set(&key, encoded.as_str(), exp)?;
            }
            Ok(removed)
        })
        .await
        .inspect_err(|err| {
            if matches!(err, CacheError::InvalidOperation { .. }) {
                self.events.emit_error(&self.options.name, err);
            }
        })
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn touch(&self, key: &str, ttl: Option<Duration>) -> Result<bool> {
        let key = self.options.namer.key(key);
        let exp = self.expiration(ttl);
        self.run(move |client| Ok(client.touch(&key, exp)?)).await
    }

    async fn flush(&self) -> Result<()> {
        self.run(|client| Ok(client.flush()?)).await?;
        debug!(cache = %self.options.name, "[Memcached] Flushed all servers");
        self.events.emit(&CacheEvent::Flush {
            cache: self.options.name.clone(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        match self.client.write().take() {
            Some(client) => {
                if Arc::strong_count(&client) > 1 {
                    warn!(cache = %self.options.name, "Memcached Cache closed with calls still in flight");
                }
                info!(cache = %self.options.name, "Memcached Cache closed");
                self.events.emit(&CacheEvent::Close {
                    cache: self.options.name.clone(),
                });
            }
            None => debug!(cache = %self.options.name, "[Memcached] already closed"),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Memcached"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> MemcachedEnv {
        MemcachedEnv::default()
    }

    #[test]
    fn test_default_server() {
        let servers = resolve_servers(&CacheOptions::default(), &env());
        assert_eq!(servers, vec!["memcache://localhost:11211"]);
    }

    #[test]
    fn test_string_list_with_inline_credentials() {
        let options = CacheOptions::default().with_location("user:pw@m1:11212, m2");
        let servers = resolve_servers(&options, &env());
        assert_eq!(
            servers,
            vec![
                "memcache://user:pw@m1:11212?protocol=binary",
                "memcache://m2:11211",
            ]
        );
    }

    #[test]
    fn test_env_supplies_servers_and_credentials() {
        let env = MemcachedEnv {
            servers: Some("a.example:1,b.example".into()),
            username: Some("svc".into()),
            password: Some("pw".into()),
        };
        let servers = resolve_servers(&CacheOptions::default(), &env);
        assert_eq!(
            servers,
            vec![
                "memcache://svc:pw@a.example:1?protocol=binary",
                "memcache://svc:pw@b.example:11211?protocol=binary",
            ]
        );
    }

    #[test]
    fn test_objects_and_arrays() {
        let location = Location::Many(vec![
            Location::Server(ServerLocation::new("obj", 2000)),
            Location::Server(ServerLocation {
                host: Some("withport:3000".into()),
                ..ServerLocation::default()
            }),
            Location::Url("plain".into()),
        ]);
        let options = CacheOptions::default().with_location(location);
        assert_eq!(
            resolve_servers(&options, &env()),
            vec![
                "memcache://obj:2000",
                "memcache://withport:3000",
                "memcache://plain:11211",
            ]
        );
    }

    #[test]
    fn test_expiration_rounds_up() {
        assert_eq!(expiration(Duration::from_millis(300)), 1);
        assert_eq!(expiration(Duration::from_millis(1001)), 2);
        assert_eq!(expiration(Duration::from_secs(300)), 300);
        assert_eq!(expiration(Duration::ZERO), 1);
    }
}
