//! Persistent image cache keyed by URL
//!
//! Downloaded bytes are stored in two co-indexed on-disk stores: a metadata
//! store holding each entry's creation time and a blob store holding the raw
//! payload. Entries older than the retention window are swept on startup, and
//! entries written under the old raw-URL key scheme are migrated lazily the
//! first time they are looked up.

mod cache;
mod error;
mod key;
mod migrate;
mod store;
mod sweep;
mod types;

pub use cache::ImageCache;
pub use error::{CacheError, Result};
pub use key::CacheKey;
pub use migrate::migrate_legacy;
pub use store::{DualStore, BLOB_STORE, METADATA_STORE};
pub use sweep::sweep_expired;
pub use types::{CacheConfig, CacheStats, MetadataRecord, SweepReport};
