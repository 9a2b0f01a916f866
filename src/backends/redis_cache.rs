//! Redis Cache - Distributed Cache Backend
//!
//! Redis stores scalars as strings and lists as native lists. Operations that
//! need a read and a write (`add`, `push`, `pop`, multi-key `get`) are batched
//! in MULTI/EXEC pipelines.
//!
//! `push` and `pop` first ask Redis for the key's `TYPE` and then act in a
//! second round trip, so the pair is best-effort rather than linearizable
//! across processes.

use crate::config::{CacheOptions, Location, ServerLocation};
use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, EventBus};
use crate::traits::CacheBackend;
use crate::value::CacheValue;
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::{Client, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_REDIS_PORT: u16 = 6379;

/// Longest ttl sent to Redis; longer ttls are clamped to it
const MAX_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Milliseconds for PSETEX/PEXPIRE, clamped so Redis accepts the expiry
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.min(MAX_TTL).as_millis()).unwrap_or(u64::MAX)
}

/// Redis-backed cache with `ConnectionManager` for automatic reconnection
///
/// # TTL policy
///
/// - `set`, `add`, `push`, `pop` and `touch` (re)apply the ttl in milliseconds
/// - `incr`/`decr` use the native counters and leave the ttl untouched; a
///   counter created by `incr` has no expiry
/// - `incr`/`decr` over a non-numeric value restart it from 0 and apply the
///   call's ttl
/// - ttls beyond 30 years are clamped to 30 years
pub struct RedisCache {
    /// `None` once `close()` has run
    conn_manager: RwLock<Option<ConnectionManager>>,
    options: CacheOptions,
    events: EventBus,
}

impl RedisCache {
    /// Create a Redis cache from resolved options
    ///
    /// # Configuration
    ///
    /// `options.location` may be a URL string or a host/port object;
    /// `options.options.db` selects a database. Without a location the
    /// `REDIS_URL` environment variable is used, defaulting to
    /// `redis://127.0.0.1:6379`.
    ///
    /// # Errors
    ///
    /// Returns an error if the location is unusable or the connection fails.
    pub async fn with_options(options: CacheOptions, events: EventBus) -> Result<Self> {
        let redis_url = redis_url(&options)?;
        info!(cache = %options.name, redis_url = %redis_url, "Initializing Redis Cache with ConnectionManager");

        let client = Client::open(redis_url.as_str())?;

        // Create ConnectionManager - handles reconnection automatically
        let mut conn_manager = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut conn_manager).await?;

        info!(cache = %options.name, "Redis Cache connected successfully (ConnectionManager enabled)");
        events.emit(&CacheEvent::Connect {
            cache: options.name.clone(),
            backend: "Redis",
        });

        Ok(Self {
            conn_manager: RwLock::new(Some(conn_manager)),
            options,
            events,
        })
    }

    /// Create a Redis cache for a URL with default options
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        Self::with_options(
            CacheOptions::default().with_location(redis_url),
            EventBus::new(),
        )
        .await
    }

    fn connection(&self) -> Result<ConnectionManager> {
        self.conn_manager
            .read()
            .clone()
            .ok_or(CacheError::Closed { backend: "Redis" })
    }

    fn ttl_ms(&self, ttl: Option<Duration>) -> u64 {
        ttl_millis(self.options.ttl(ttl))
    }

    /// INCR/DECR, restarting from 0 when the stored value is not an integer
    async fn counter(&self, key: &str, ttl: Option<Duration>, up: bool) -> Result<i64> {
        let mut conn = self.connection()?;
        let key = self.options.namer.key(key);
        let command = if up { "INCR" } else { "DECR" };
        debug!(key = %key, command, "[Redis] counter");

        let reply: redis::RedisResult<i64> = redis::cmd(command).arg(&key).query_async(&mut conn).await;
        match reply {
            Ok(n) => Ok(n),
            Err(err) => {
                if self.key_type(&mut conn, &key).await? == "none" {
                    return Err(err.into());
                }
                // present but not numeric: counts as 0
                let seed: i64 = if up { 1 } else { -1 };
                let _: () = redis::cmd("PSETEX")
                    .arg(&key)
                    .arg(self.ttl_ms(ttl))
                    .arg(seed)
                    .query_async(&mut conn)
                    .await?;
                debug!(key = %key, seed, "[Redis] Reseeded non-numeric counter");
                Ok(seed)
            }
        }
    }

    async fn key_type(&self, conn: &mut ConnectionManager, key: &str) -> Result<String> {
        Ok(redis::cmd("TYPE").arg(key).query_async(conn).await?)
    }

    fn reject(&self, operation: &'static str, found: &str) -> CacheError {
        let err = CacheError::invalid_operation(operation, found);
        self.events.emit_error(&self.options.name, &err);
        err
    }
}

/// Work out the connection URL for a cache
fn redis_url(options: &CacheOptions) -> Result<String> {
    let db = options.option_u64("db");
    match &options.location {
        Some(Location::Url(url)) => Ok(url.clone()),
        Some(Location::Server(server)) => Ok(server_url(server, db)),
        Some(Location::Many(_)) => Err(CacheError::improperly_configured(format!(
            "redis cache '{}' accepts a single location",
            options.name
        ))),
        None => {
            let url = std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());
            Ok(url)
        }
    }
}

fn server_url(server: &ServerLocation, db: Option<u64>) -> String {
    let (host, port) = server.host_port("127.0.0.1", DEFAULT_REDIS_PORT);
    let auth = match (&server.username, &server.password) {
        (Some(user), Some(pass)) => format!("{user}:{pass}@"),
        (None, Some(pass)) => format!(":{pass}@"),
        _ => String::new(),
    };
    let db = db.map(|db| format!("/{db}")).unwrap_or_default();
    format!("redis://{auth}{host}:{port}{db}")
}

/// Convert a reply into a typed value
fn decode(value: Value) -> Option<CacheValue> {
    match value {
        Value::Nil => None,
        Value::Int(n) => Some(CacheValue::Integer(n)),
        Value::BulkString(bytes) => Some(CacheValue::typecast(&String::from_utf8_lossy(&bytes))),
        Value::SimpleString(s) => Some(CacheValue::typecast(&s)),
        Value::Array(items) => Some(CacheValue::List(items.into_iter().filter_map(decode).collect())),
        _ => None,
    }
}

fn decode_list(items: Vec<String>) -> Vec<CacheValue> {
    items.iter().map(|item| CacheValue::typecast(item)).collect()
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn add(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<CacheValue> {
        let mut conn = self.connection()?;
        let key = self.options.namer.key(key);

        let (original, added): (Option<String>, i64) = redis::pipe()
            .atomic()
            .cmd("GET")
            .arg(&key)
            .cmd("SETNX")
            .arg(&key)
            .arg(value.encode())
            .query_async(&mut conn)
            .await?;

        let _: i64 = redis::cmd("PEXPIRE")
            .arg(&key)
            .arg(self.ttl_ms(ttl))
            .query_async(&mut conn)
            .await?;

        debug!(key = %key, added = added == 1, "[Redis] add");
        match original {
            Some(existing) if added == 0 => Ok(CacheValue::typecast(&existing)),
            _ => Ok(value),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let mut values = self.get_many(&[key]).await?;
        Ok(values.remove(key).flatten())
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Option<CacheValue>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.connection()?;
        let namespaced: Vec<String> = keys.iter().map(|k| self.options.namer.key(k)).collect();

        let mut types = redis::pipe();
        types.atomic();
        for key in &namespaced {
            types.cmd("TYPE").arg(key);
        }
        let types: Vec<String> = types.query_async(&mut conn).await?;

        let mut fetch = redis::pipe();
        fetch.atomic();
        for (key, kind) in namespaced.iter().zip(&types) {
            if kind == "list" {
                fetch.cmd("LRANGE").arg(key).arg(0).arg(-1);
            } else {
                fetch.cmd("GET").arg(key);
            }
        }
        let replies: Vec<Value> = fetch.query_async(&mut conn).await?;

        Ok(keys
            .iter()
            .map(|k| (*k).to_string())
            .zip(replies.into_iter().map(decode))
            .collect())
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<CacheValue> {
        let mut conn = self.connection()?;
        let key = self.options.namer.key(key);
        let ttl_ms = self.ttl_ms(ttl);

        match &value {
            CacheValue::List(items) => {
                let mut txn = redis::pipe();
                txn.atomic().cmd("DEL").arg(&key).ignore();
                // an empty list is an absent key to redis
                if !items.is_empty() {
                    let encoded: Vec<String> = items.iter().map(CacheValue::encode).collect();
                    txn.cmd("RPUSH").arg(&key).arg(encoded).ignore();
                    txn.cmd("PEXPIRE").arg(&key).arg(ttl_ms).ignore();
                }
                let _: () = txn.query_async(&mut conn).await?;
            }
            scalar => {
                let _: () = redis::cmd("PSETEX")
                    .arg(&key)
                    .arg(ttl_ms)
                    .arg(scalar.encode())
                    .query_async(&mut conn)
                    .await?;
            }
        }
        debug!(key = %key, ttl_ms, "[Redis] Cached key with TTL");
        Ok(value)
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        self.counter(key, ttl, true).await
    }

    async fn decr(&self, key: &str, ttl: Option<Duration>) -> Result<i64> {
        self.counter(key, ttl, false).await
    }

    async fn push(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<Vec<CacheValue>> {
        let mut conn = self.connection()?;
        let key = self.options.namer.key(key);
        let ttl_ms = self.ttl_ms(ttl);
        let kind = self.key_type(&mut conn, &key).await?;

        let mut txn = redis::pipe();
        txn.atomic();
        match kind.as_str() {
            "list" | "none" => {}
            // collapse the scalar into the head of a new list
            "string" => {
                let previous: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
                txn.cmd("DEL").arg(&key).ignore();
                if let Some(previous) = previous {
                    txn.cmd("RPUSH").arg(&key).arg(previous).ignore();
                }
            }
            other => return Err(self.reject("push", other)),
        }
        txn.cmd("RPUSH").arg(&key).arg(value.encode()).ignore();
        txn.cmd("PEXPIRE").arg(&key).arg(ttl_ms).ignore();
        txn.cmd("LRANGE").arg(&key).arg(0).arg(-1);

        let (items,): (Vec<String>,) = txn.query_async(&mut conn).await?;
        debug!(key = %key, ttl_ms, len = items.len(), "[Redis] push");
        Ok(decode_list(items))
    }

    async fn pop(
        &self,
        key: &str,
        matching: Option<CacheValue>,
        ttl: Option<Duration>,
    ) -> Result<Option<CacheValue>> {
        let mut conn = self.connection()?;
        let key = self.options.namer.key(key);
        let ttl_ms = self.ttl_ms(ttl);
        let kind = self.key_type(&mut conn, &key).await?;

        if kind != "list" {
            let found = if kind == "none" { "missing" } else { kind.as_str() };
            return Err(self.reject("pop", found));
        }

        debug!(key = %key, matching = ?matching, ttl_ms, "[Redis] pop");
        match matching {
            Some(wanted) => {
                let (removed,): (i64,) = redis::pipe()
                    .atomic()
                    .cmd("LREM")
                    .arg(&key)
                    .arg(1)
                    .arg(wanted.encode())
                    .cmd("PEXPIRE")
                    .arg(&key)
                    .arg(ttl_ms)
                    .ignore()
                    .query_async(&mut conn)
                    .await?;
                Ok((removed > 0).then_some(wanted))
            }
            None => {
                let (last,): (Option<String>,) = redis::pipe()
                    .atomic()
                    .cmd("RPOP")
                    .arg(&key)
                    .cmd("PEXPIRE")
                    .arg(&key)
                    .arg(ttl_ms)
                    .ignore()
                    .query_async(&mut conn)
                    .await?;
                Ok(last.map(|raw| CacheValue::typecast(&raw)))
            }
        }
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection()?;
        let exists: i64 = redis::cmd("EXISTS")
            .arg(self.options.namer.key(key))
            .query_async(&mut conn)
            .await?;
        Ok(exists > 0)
    }

    async fn touch(&self, key: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut conn = self.connection()?;
        let touched: i64 = redis::cmd("PEXPIRE")
            .arg(self.options.namer.key(key))
            .arg(self.ttl_ms(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(touched == 1)
    }

    async fn flush(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        debug!(cache = %self.options.name, "[Redis] Flushed database");
        self.events.emit(&CacheEvent::Flush {
            cache: self.options.name.clone(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // dropping the last ConnectionManager clone closes the socket
        if self.conn_manager.write().take().is_some() {
            info!(cache = %self.options.name, "Redis Cache closed");
            self.events.emit(&CacheEvent::Close {
                cache: self.options.name.clone(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}
