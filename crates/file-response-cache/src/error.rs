//! Error types for the file response cache

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
