//! Streaming image downloads

use crate::error::{FetchError, Result};
use crate::observer::ResolveObserver;
use crate::types::{Headers, ProgressEvent};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, warn};

/// HTTP client for downloading images from their origin
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Use a preconfigured client, e.g. one with a timeout
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Download `url`, reporting progress per received chunk.
    ///
    /// Progress is only reported when the response declares a non-zero
    /// length. A non-2xx status and an empty body are errors.
    pub async fn fetch(
        &self,
        url: &str,
        headers: &Headers,
        observer: &dyn ResolveObserver,
    ) -> Result<Vec<u8>> {
        let header_map = to_header_map(headers)?;

        debug!(url, "Fetching image");
        let mut response = self.client.get(url).headers(header_map).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url, "Failed to fetch image");
            return Err(FetchError::Status(status.as_u16()));
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            if let Some(total) = total {
                observer.on_progress(&ProgressEvent::new(data.len() as u64, total));
            }
        }

        if data.is_empty() {
            warn!(url, "Origin returned an empty body");
            return Err(FetchError::EmptyBody);
        }

        debug!(url, size = data.len(), "Fetched image");
        Ok(data)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::InvalidHeader(format!("{}: {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}
