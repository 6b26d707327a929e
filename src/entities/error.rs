//! Error types for resource loading and cache API misuse.
//!
//! Load failures never propagate out of the cache: they are recorded on
//! the entry and announced on the event bus. `CacheError` only covers
//! invalid input (empty keys, bad configuration).

use std::fmt;
use std::io;

/// Resource loading errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Resource does not exist at the resolved location
    NotFound(String),
    /// Read/transport error
    Io(String),
    /// Resource was fetched but is not playable
    Decode(String),
    /// Anything a custom loader wants to report
    Other(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(e) => write!(f, "Not found: {}", e),
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::Decode(e) => write!(f, "Decode error: {}", e),
            LoadError::Other(e) => write!(f, "Load error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(err.to_string()),
            _ => LoadError::Io(err.to_string()),
        }
    }
}

/// Cache API errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Resource keys must be non-empty
    EmptyKey,
    /// Configuration rejected by `CacheConfig::validate`
    InvalidConfig(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::EmptyKey => write!(f, "Resource key must not be empty"),
            CacheError::InvalidConfig(e) => write!(f, "Invalid cache config: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}
