//! Basic usage: configure caches, use the default through the registry, and
//! reach a named cache directly.
//!
//! `cargo run --example basic_usage`

use membrane::{CacheConfig, CacheRegistry, CacheValue, CachesConfig, EventKind};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CachesConfig::new()
        .with_cache(
            "default",
            CacheConfig::new("memory")
                .with_prefix("demo")
                .with_timeout(Duration::from_secs(30)),
        )
        .with_cache("noop", CacheConfig::new("dummy"));

    let registry = CacheRegistry::from_config(config).await?;
    registry.events().on(EventKind::Error, |event| {
        println!("cache error event: {event:?}");
    });

    // scalars keep their type
    registry.set("user:1:name", "alice", None).await?;
    registry.set("user:1:age", 31, None).await?;
    println!("name = {:?}", registry.get("user:1:name").await?);
    println!("age  = {:?}", registry.get("user:1:age").await?);

    // add never overwrites
    let kept = registry.add("user:1:name", "mallory", None).await?;
    println!("add kept {kept}");

    // counters
    for _ in 0..3 {
        registry.incr("visits", None).await?;
    }
    println!("visits = {}", registry.decr("visits", None).await?);

    // lists
    for job in ["resize", "encode", "upload"] {
        registry.push("jobs", job, None).await?;
    }
    println!("popped {:?}", registry.pop("jobs", None, None).await?);
    println!("removed {:?}", registry.pop("jobs", Some(CacheValue::from("resize")), None).await?);
    println!("jobs = {:?}", registry.get("jobs").await?);

    // popping a scalar is rejected and reported
    if let Err(err) = registry.pop("visits", None, None).await {
        println!("pop on a counter failed: {err} ({})", err.code());
    }

    let many = registry.get_many(&["user:1:name", "user:1:age", "missing"]).await?;
    println!("many = {many:?}");

    let noop = registry.cache("noop")?;
    noop.set("user:1:name", CacheValue::from("ignored"), None).await?;
    println!("noop get = {:?}", noop.get("user:1:name").await?);

    registry.flush().await?;
    println!("after flush has(user:1:name) = {}", registry.has("user:1:name").await?);

    registry.close_all().await?;
    Ok(())
}
