//! Core types for the caching proxy

use std::fmt;

/// Name of the response header reporting the cache disposition
pub const X_CACHE: &str = "x-cache";

/// How a request was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache
    Hit,
    /// Fetched from the origin and cached
    Miss,
    /// Unsafe method, forwarded without touching the cache
    Bypass,
}

impl CacheStatus {
    /// Value of the `X-Cache` header. Bypassed requests report `MISS`.
    pub fn header_value(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss | CacheStatus::Bypass => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Hit => write!(f, "HIT"),
            CacheStatus::Miss => write!(f, "MISS"),
            CacheStatus::Bypass => write!(f, "BYPASS"),
        }
    }
}
