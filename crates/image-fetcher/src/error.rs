//! Error types for the fetch-or-serve pipeline

use image_cache::CacheError;
use std::fmt;

#[derive(Debug)]
pub enum FetchError {
    /// Transport failure talking to the origin
    Http(Box<reqwest::Error>),
    /// The origin answered with a non-2xx status
    Status(u16),
    /// The origin answered 2xx with no body
    EmptyBody,
    InvalidHeader(String),
    /// Served bytes could not be decoded by the consumer
    Decode(String),
    Cache(CacheError),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Http(err) => write!(f, "HTTP error: {}", err),
            FetchError::Status(status) => write!(f, "Origin returned status {}", status),
            FetchError::EmptyBody => write!(f, "Origin returned an empty body"),
            FetchError::InvalidHeader(msg) => write!(f, "Invalid request header: {}", msg),
            FetchError::Decode(msg) => write!(f, "Image could not be decoded: {}", msg),
            FetchError::Cache(err) => write!(f, "Cache error: {}", err),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Http(err) => Some(err.as_ref()),
            FetchError::Cache(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(Box::new(err))
    }
}

impl From<CacheError> for FetchError {
    fn from(err: CacheError) -> Self {
        FetchError::Cache(err)
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
