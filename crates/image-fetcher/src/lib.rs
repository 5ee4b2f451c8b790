//! Fetch-or-serve pipeline for cached images
//!
//! Serves an image from [`image_cache::ImageCache`] when present, otherwise
//! downloads it with progress reporting, persists it and returns the bytes.

pub mod error;
pub mod fetcher;
pub mod observer;
pub mod pipeline;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::{FetchError, Result};
pub use fetcher::HttpFetcher;
pub use observer::ResolveObserver;
pub use pipeline::ImageResolver;
pub use types::{Headers, ProgressEvent, ResolveEvent, ResolveSource, Resolved};
