//! Shows the structured logs the backends emit.
//!
//! `RUST_LOG=membrane=debug cargo run --example tracing_demo`

use membrane::{CacheConfig, CacheRegistry, CachesConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .init();

    tracing::info!("Starting tracing verification...");

    let config = CachesConfig::new()
        .with_cache("default", CacheConfig::new("memory"))
        .with_cache("broken", CacheConfig::new("no-such-backend"));
    let registry = CacheRegistry::from_config(config).await?;

    registry.set("test_key", "value", None).await?;
    registry.push("test_list", 1, None).await?;
    registry.pop("test_list", None, None).await?;
    registry.flush().await?;

    tracing::info!("Operation complete");
    Ok(())
}
