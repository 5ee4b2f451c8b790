//! Deterministic cache keys derived from URLs

use std::fmt;
use uuid::Uuid;

/// Identifier under which an image is stored in both stores.
///
/// A UUID v5 of the URL in the URL namespace, rendered hyphenated and
/// lowercase. The namespace must never change for a deployed cache: doing so
/// orphans every existing entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(url: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
