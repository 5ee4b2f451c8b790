//! Process-wide image cache handle

use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::migrate::migrate_legacy;
use crate::store::DualStore;
use crate::sweep::sweep_expired;
use crate::types::{CacheConfig, CacheStats};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// URL-keyed image cache over a [`DualStore`].
///
/// Construct once, call [`init`](Self::init), then share it (usually behind
/// an `Arc`). Every operation fails with [`CacheError::NotInitialized`] until
/// `init` has succeeded.
pub struct ImageCache {
    config: CacheConfig,
    /// `None` until opened; the write lock is only taken by `init` and `clear_all`
    store: RwLock<Option<DualStore>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageCache {
    /// Create a new, unopened image cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            store: RwLock::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Open the stores and evict expired entries.
    ///
    /// Calling this again once the stores are open does nothing.
    pub async fn init(&self) -> Result<()> {
        let mut guard = self.store.write().await;
        if guard.is_some() {
            debug!("Image cache already initialized");
            return Ok(());
        }

        let root = self.config.root();
        let store = DualStore::open(&root, self.config.storage_already_initialized).await?;
        sweep_expired(&store, self.config.retention, Utc::now()).await?;

        *guard = Some(store);
        info!(
            cache_dir = ?root,
            retention_secs = self.config.retention.num_seconds(),
            "Cache initialized"
        );
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.store.read().await.is_some()
    }

    async fn require_open(&self) -> Result<RwLockReadGuard<'_, DualStore>> {
        RwLockReadGuard::try_map(self.store.read().await, Option::as_ref)
            .map_err(|_| CacheError::NotInitialized)
    }

    /// Get the cached bytes for `url`, migrating a legacy URL-keyed entry first
    pub async fn get_cached_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let store = self.require_open().await?;

        if let Err(e) = migrate_legacy(&store, url).await {
            warn!(url, error = %e, "Failed to migrate legacy cache entry");
        }

        let key = CacheKey::derive(url);
        match store.get(key.as_str()).await {
            Some(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(url, key = %key, "Cache hit");
                Ok(Some(data))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(url, key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Store `data` for `url`, replacing any previous entry
    pub async fn store_bytes(&self, url: &str, data: &[u8]) -> Result<()> {
        let store = self.require_open().await?;
        store.put(CacheKey::derive(url).as_str(), data).await
    }

    /// Delete the entry for `url`, including a not yet migrated legacy entry
    pub async fn delete_entry(&self, url: &str) -> Result<()> {
        let store = self.require_open().await?;
        store.delete(CacheKey::derive(url).as_str()).await?;
        store.delete(url).await?;
        debug!(url, "Removed cache entry");
        Ok(())
    }

    /// Whether both stores hold an entry for `url`
    pub async fn is_cached(&self, url: &str) -> Result<bool> {
        let store = self.require_open().await?;
        Ok(store.contains(CacheKey::derive(url).as_str()).await)
    }

    /// Destroy every entry in both stores and reopen them empty
    pub async fn clear_all(&self) -> Result<()> {
        let guard = self.store.write().await;
        let store = guard.as_ref().ok_or(CacheError::NotInitialized)?;
        store.wipe_all().await?;
        info!("Cleared image cache");
        Ok(())
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> Result<CacheStats> {
        let store = self.require_open().await?;
        let (entries, total_size) = store.blob_usage().await?;
        Ok(CacheStats {
            entries,
            total_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BLOB_STORE, METADATA_STORE};
    use chrono::Duration;
    use tempfile::tempdir;

    async fn open_cache(dir: &std::path::Path) -> ImageCache {
        let cache = ImageCache::new(CacheConfig::new(dir));
        cache.init().await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_operations_before_init_fail() {
        let dir = tempdir().unwrap();
        let cache = ImageCache::new(CacheConfig::new(dir.path()));

        assert!(!cache.is_initialized().await);
        assert!(matches!(
            cache.get_cached_bytes("http://x/a.png").await,
            Err(CacheError::NotInitialized)
        ));
        assert!(matches!(
            cache.is_cached("http://x/a.png").await,
            Err(CacheError::NotInitialized)
        ));
        assert!(matches!(
            cache.store_bytes("http://x/a.png", b"data").await,
            Err(CacheError::NotInitialized)
        ));
        assert!(matches!(
            cache.delete_entry("http://x/a.png").await,
            Err(CacheError::NotInitialized)
        ));
        assert!(matches!(
            cache.clear_all().await,
            Err(CacheError::NotInitialized)
        ));
        assert!(matches!(cache.stats().await, Err(CacheError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path()).await;
        cache.store_bytes("http://x/a.png", b"data").await.unwrap();

        cache.init().await.unwrap();
        assert!(cache.is_initialized().await);
        assert!(cache.is_cached("http://x/a.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path()).await;
        let url = "http://x/a.png";

        assert!(!cache.is_cached(url).await.unwrap());
        assert_eq!(cache.get_cached_bytes(url).await.unwrap(), None);

        cache.store_bytes(url, &[1u8; 100]).await.unwrap();

        assert!(cache.is_cached(url).await.unwrap());
        assert_eq!(
            cache.get_cached_bytes(url).await.unwrap(),
            Some(vec![1u8; 100])
        );
    }

    #[tokio::test]
    async fn test_empty_payload_is_not_cached() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path()).await;
        let url = "http://x/empty.png";

        cache.store_bytes(url, b"").await.unwrap();

        let got = cache.get_cached_bytes(url).await.unwrap();
        assert_eq!(got, None);
        assert_eq!(cache.is_cached(url).await.unwrap(), got.is_some());
        assert_eq!(cache.stats().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn test_init_sweeps_expired_entries() {
        let dir = tempdir().unwrap();
        {
            let store = DualStore::open(dir.path(), false).await.unwrap();
            let now = Utc::now();
            store
                .put_at(
                    CacheKey::derive("http://x/old.png").as_str(),
                    b"old",
                    now - Duration::days(8),
                )
                .await
                .unwrap();
            store
                .put_at(
                    CacheKey::derive("http://x/new.png").as_str(),
                    b"new",
                    now - Duration::days(6),
                )
                .await
                .unwrap();
        }

        let cache = open_cache(dir.path()).await;
        assert!(!cache.is_cached("http://x/old.png").await.unwrap());
        assert!(cache.is_cached("http://x/new.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_retention() {
        let dir = tempdir().unwrap();
        {
            let store = DualStore::open(dir.path(), false).await.unwrap();
            store
                .put_at(
                    CacheKey::derive("http://x/a.png").as_str(),
                    b"a",
                    Utc::now() - Duration::hours(2),
                )
                .await
                .unwrap();
        }

        let cache =
            ImageCache::new(CacheConfig::new(dir.path()).with_retention(Duration::hours(1)));
        cache.init().await.unwrap();
        assert!(!cache.is_cached("http://x/a.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_migrates_legacy_entry() {
        let dir = tempdir().unwrap();
        let url = "http://x/legacy.png";
        {
            let store = DualStore::open(dir.path(), false).await.unwrap();
            store.put(url, b"legacy").await.unwrap();
        }

        let cache = open_cache(dir.path()).await;
        // Membership is by derived key only; lookup performs the migration
        assert!(!cache.is_cached(url).await.unwrap());
        assert_eq!(
            cache.get_cached_bytes(url).await.unwrap(),
            Some(b"legacy".to_vec())
        );
        assert!(cache.is_cached(url).await.unwrap());

        let store = DualStore::open(dir.path(), false).await.unwrap();
        assert!(store.has_metadata(CacheKey::derive(url).as_str()).await);
        assert!(!store.has_metadata(url).await);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path()).await;

        cache.store_bytes("http://x/a.png", b"a").await.unwrap();
        cache.store_bytes("http://x/b.png", b"b").await.unwrap();

        cache.delete_entry("http://x/a.png").await.unwrap();
        assert!(!cache.is_cached("http://x/a.png").await.unwrap());
        assert!(cache.is_cached("http://x/b.png").await.unwrap());

        // Deleting again is fine
        cache.delete_entry("http://x/a.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_all() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path()).await;
        let urls: Vec<String> = (0..10).map(|i| format!("http://x/{i}.png")).collect();

        for url in &urls {
            cache.store_bytes(url, b"payload").await.unwrap();
        }
        assert_eq!(cache.stats().await.unwrap().entries, 10);

        cache.clear_all().await.unwrap();

        let metadata = std::fs::read_dir(dir.path().join(METADATA_STORE)).unwrap();
        let blobs = std::fs::read_dir(dir.path().join(BLOB_STORE)).unwrap();
        assert_eq!(metadata.count(), 0);
        assert_eq!(blobs.count(), 0);
        for url in &urls {
            assert!(!cache.is_cached(url).await.unwrap());
        }

        // Reopened empty, not closed
        cache.store_bytes(&urls[0], b"again").await.unwrap();
        assert!(cache.is_cached(&urls[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path()).await;

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_size, 0);

        // Miss, then store and hit
        cache.get_cached_bytes("http://x/a.png").await.unwrap();
        cache
            .store_bytes("http://x/a.png", b"test data")
            .await
            .unwrap();
        cache.get_cached_bytes("http://x/a.png").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_size, 9);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }
}
