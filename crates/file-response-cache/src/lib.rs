//! File-based HTTP response cache with TTL expiration
//!
//! Stores each cached response as three sibling files (body, status, headers)
//! under a single directory. Entries expire lazily on read and actively via
//! a background [`Sweeper`].

mod cache;
mod error;
mod headers;
mod sweeper;
mod types;

pub use cache::FileCache;
pub use error::{CacheError, Result};
pub use headers::{decode_headers, encode_headers};
pub use sweeper::Sweeper;
pub use types::{CacheStats, CachedResponse, HEADERS_SUFFIX, STATUS_SUFFIX};
