//! Serve from cache or download, persist and serve

use crate::error::{FetchError, Result};
use crate::fetcher::HttpFetcher;
use crate::observer::{ChannelObserver, ResolveObserver};
use crate::types::{Headers, ResolveEvent, ResolveSource, Resolved};
use futures::Stream;
use image_cache::ImageCache;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Resolves image URLs against the cache, falling back to the network.
///
/// Concurrent resolves of the same URL are not coalesced: each one that
/// misses downloads on its own and the last write wins.
pub struct ImageResolver {
    cache: Arc<ImageCache>,
    fetcher: HttpFetcher,
}

impl ImageResolver {
    pub fn new(cache: Arc<ImageCache>, fetcher: HttpFetcher) -> Self {
        Self { cache, fetcher }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Return the bytes for `url`, from cache when present.
    ///
    /// On a miss the image is downloaded with `headers` and persisted. A failed
    /// write is reported to `observer` but the downloaded bytes are still
    /// returned. Any terminal error is passed to `observer` before returning.
    pub async fn resolve(
        &self,
        url: &str,
        headers: &Headers,
        observer: &dyn ResolveObserver,
    ) -> Result<Resolved> {
        match self.resolve_inner(url, headers, observer).await {
            Ok(resolved) => Ok(resolved),
            Err(e) => {
                error!(url, error = %e, "Failed to resolve image");
                observer.on_error(&e);
                Err(e)
            }
        }
    }

    async fn resolve_inner(
        &self,
        url: &str,
        headers: &Headers,
        observer: &dyn ResolveObserver,
    ) -> Result<Resolved> {
        if let Some(data) = self.cache.get_cached_bytes(url).await? {
            return Ok(Resolved {
                data,
                source: ResolveSource::Cache,
            });
        }

        let data = self.fetcher.fetch(url, headers, observer).await?;

        if let Err(e) = self.cache.store_bytes(url, &data).await {
            warn!(url, error = %e, "Failed to cache image");
            observer.on_error(&FetchError::Cache(e));
        }

        Ok(Resolved {
            data,
            source: ResolveSource::Network,
        })
    }

    /// Resolve `url` on a spawned task, yielding progress and error events
    /// followed by a single [`ResolveEvent::Finished`].
    ///
    /// Dropping the stream does not cancel the resolve; it runs to completion
    /// so the cache still gets populated.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn resolve_stream(
        self: &Arc<Self>,
        url: impl Into<String>,
        headers: Headers,
    ) -> impl Stream<Item = ResolveEvent> + Send + 'static {
        let (tx, rx) = mpsc::unbounded_channel();
        let resolver = Arc::clone(self);
        let url = url.into();

        tokio::spawn(async move {
            let observer = ChannelObserver { tx };
            let result = resolver.resolve(&url, &headers, &observer).await;
            if observer.tx.send(ResolveEvent::Finished(result)).is_err() {
                debug!(url = %url, "Resolve finished with no listener");
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }

    /// Evict `url` after the consumer failed to decode the bytes it was served,
    /// so the next resolve downloads it again
    pub async fn report_decode_failure(
        &self,
        url: &str,
        reason: impl Into<String>,
        observer: &dyn ResolveObserver,
    ) -> Result<()> {
        let err = FetchError::Decode(reason.into());
        warn!(url, error = %err, "Evicting undecodable cache entry");
        observer.on_error(&err);
        self.cache.delete_entry(url).await?;
        Ok(())
    }
}
