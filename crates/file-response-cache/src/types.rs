//! Cache types

use http::{HeaderMap, StatusCode};

/// Suffix of the file holding an entry's status code
pub const STATUS_SUFFIX: &str = "-status";

/// Suffix of the file holding an entry's serialized headers
pub const HEADERS_SUFFIX: &str = "-headers";

/// A fully buffered HTTP response as stored in the cache
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Statistics about cache reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

/// Key of the status sub-value for a logical entry key
pub(crate) fn status_key(key: &str) -> String {
    format!("{}{}", key, STATUS_SUFFIX)
}

/// Key of the headers sub-value for a logical entry key
pub(crate) fn headers_key(key: &str) -> String {
    format!("{}{}", key, HEADERS_SUFFIX)
}

/// Strip a sub-value suffix, yielding the logical entry key
pub(crate) fn logical_key(key: &str) -> &str {
    key.strip_suffix(STATUS_SUFFIX)
        .or_else(|| key.strip_suffix(HEADERS_SUFFIX))
        .unwrap_or(key)
}

/// All three sub-value keys of a logical entry: body, status, headers
pub(crate) fn sibling_keys(key: &str) -> [String; 3] {
    let base = logical_key(key);
    [base.to_string(), status_key(base), headers_key(base)]
}
