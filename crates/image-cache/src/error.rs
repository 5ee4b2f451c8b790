//! Error types for the image cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// An operation was attempted before `ImageCache::init` succeeded
    NotInitialized,
    Io(Box<std::io::Error>),
    /// A metadata record could not be decoded
    Corrupt(Box<serde_json::Error>),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::NotInitialized => {
                write!(f, "Image cache is not initialized, call init() first")
            }
            CacheError::Io(err) => write!(f, "Store IO error: {}", err),
            CacheError::Corrupt(err) => write!(f, "Corrupt metadata record: {}", err),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Corrupt(err) => Some(err.as_ref()),
            CacheError::NotInitialized => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Corrupt(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
