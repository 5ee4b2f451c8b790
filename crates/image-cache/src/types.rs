//! Cache types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Contents of a metadata store record.
///
/// The store key is kept inside the record because record files are named by
/// a hash of the key, and the sweeper needs the key to delete the blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub key: String,
    pub created_at: DateTime<Utc>,
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Outcome of an eviction sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub evicted: usize,
    /// Records whose timestamp could not be read; these are kept
    pub skipped: usize,
    /// Temp files from interrupted writes that were deleted
    pub temp_removed: usize,
}

/// Configuration for opening an [`ImageCache`](crate::ImageCache)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory holding both stores; `None` uses `./cache/images`
    pub location: Option<PathBuf>,
    /// Maximum entry age before the startup sweep evicts it
    pub retention: Duration,
    /// The root directory is managed by someone else and must already exist
    pub storage_already_initialized: bool,
}

pub const DEFAULT_LOCATION: &str = "./cache/images";

impl CacheConfig {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn root(&self) -> PathBuf {
        self.location
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCATION))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: None,
            retention: Duration::days(7),
            storage_already_initialized: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.retention, Duration::days(7));
        assert!(!config.storage_already_initialized);
        assert_eq!(config.root(), PathBuf::from("./cache/images"));
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::new("/tmp/images").with_retention(Duration::hours(1));
        assert_eq!(config.root(), PathBuf::from("/tmp/images"));
        assert_eq!(config.retention, Duration::hours(1));
    }

    #[test]
    fn test_metadata_record_serialization() {
        let record = MetadataRecord {
            key: "d11e8997-ea14-5750-97be-5fe0b9a1c45b".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("created_at"));

        let deserialized: MetadataRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, record);
    }
}
