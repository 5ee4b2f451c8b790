//! Image cache proxy
//!
//! Serves images by URL through the persistent image cache, downloading and
//! persisting them on a miss.

mod error;
mod server;
mod types;

use crate::error::{ProxyError, Result};
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ProxyConfig;
use image_cache::{CacheConfig, ImageCache};
use image_fetcher::{HttpFetcher, ImageResolver};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("image_cache_proxy=info".parse()?)
        .add_directive("image_cache=info".parse()?)
        .add_directive("image_fetcher=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting image cache proxy...");

    let config = load_config();
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Retention: {} seconds", config.retention_secs);

    let retention = chrono::Duration::try_seconds(config.retention_secs).ok_or_else(|| {
        ProxyError::Config(format!("retention out of range: {}", config.retention_secs))
    })?;
    let cache_config = CacheConfig::new(config.cache_dir.clone()).with_retention(retention);
    let cache = Arc::new(ImageCache::new(cache_config));
    cache.init().await?;

    // The pipeline imposes no timeout of its own
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .build()?;
    let resolver = ImageResolver::new(cache, HttpFetcher::with_client(client));

    let state: SharedState = Arc::new(ServerState::new(resolver));

    start_server(state, config.port).await?;

    Ok(())
}

fn load_config() -> ProxyConfig {
    let defaults = ProxyConfig::default();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(defaults.port);

    let cache_dir = std::env::var("CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.cache_dir);

    let retention_secs = std::env::var("CACHE_RETENTION_SECS")
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|secs| *secs >= 0)
        .unwrap_or(defaults.retention_secs);

    let fetch_timeout_secs = std::env::var("FETCH_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.fetch_timeout_secs);

    ProxyConfig {
        port,
        cache_dir,
        retention_secs,
        fetch_timeout_secs,
    }
}
