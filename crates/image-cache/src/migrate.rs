//! Lazy migration of entries stored under the raw URL

use crate::error::Result;
use crate::key::CacheKey;
use crate::store::DualStore;
use tracing::info;

/// Move an entry stored under the literal `url` to its derived key.
///
/// Runs only when both stores hold the URL-keyed records. The creation time
/// and payload carry over unchanged, then the URL-keyed records are removed.
/// Returns whether anything was migrated; repeating the call is a no-op.
pub async fn migrate_legacy(store: &DualStore, url: &str) -> Result<bool> {
    let key = CacheKey::derive(url);
    if key.as_str() == url || !store.contains(url).await {
        return Ok(false);
    }

    let Some(record) = store.read_metadata(url).await? else {
        return Ok(false);
    };
    let Some(payload) = store.read_blob(url).await? else {
        return Ok(false);
    };

    store.put_at(key.as_str(), &payload, record.created_at).await?;
    store.delete(url).await?;

    info!(url, key = %key, "Migrated legacy cache entry");
    Ok(true)
}
