//! Pipeline types

use crate::error::FetchError;
use std::collections::HashMap;

/// Request headers sent to the origin
pub type Headers = HashMap<String, String>;

/// Download progress for a single response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    /// 0.0 to 100.0
    pub percentage: f64,
}

impl ProgressEvent {
    /// Build an event; `total` must be non-zero
    pub fn new(downloaded_bytes: u64, total_bytes: u64) -> Self {
        let percentage = (downloaded_bytes as f64 / total_bytes as f64 * 100.0).min(100.0);
        Self {
            downloaded_bytes,
            total_bytes,
            percentage,
        }
    }
}

/// Where resolved bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveSource {
    Cache,
    Network,
}

/// Successful outcome of a resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub data: Vec<u8>,
    pub source: ResolveSource,
}

impl Resolved {
    pub fn from_cache(&self) -> bool {
        self.source == ResolveSource::Cache
    }
}

/// Item of a streamed resolve: any number of `Progress` and `Error` events,
/// then exactly one `Finished`
#[derive(Debug)]
pub enum ResolveEvent {
    Progress(ProgressEvent),
    /// An error passed to the observer. A failed cache write shows up here
    /// while `Finished` still carries the bytes.
    Error(String),
    Finished(Result<Resolved, FetchError>),
}
