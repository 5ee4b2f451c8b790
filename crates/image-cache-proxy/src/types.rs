//! Core types for the image cache proxy

use image_cache::CacheStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the proxy
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub cache_dir: PathBuf,
    pub retention_secs: i64,
    pub fetch_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            cache_dir: PathBuf::from("./cache/images"),
            retention_secs: 7 * 24 * 60 * 60, // 7 days
            fetch_timeout_secs: 30,
        }
    }
}

/// `?url=` query of the image endpoints
#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CachedResponse {
    pub url: String,
    pub cached: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}
