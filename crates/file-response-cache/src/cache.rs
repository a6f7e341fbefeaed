//! File-based response storage with lazy expiration

use crate::error::{CacheError, Result};
use crate::headers::{decode_headers, encode_headers};
use crate::types::{headers_key, logical_key, sibling_keys, status_key, CacheStats, CachedResponse};
use http::{HeaderMap, StatusCode};
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

/// A response cache that keeps every value in its own file.
///
/// Values are addressed by key; a cached response is three sibling values
/// (`K`, `K-status`, `K-headers`). With a non-zero TTL, reads delete values
/// whose file is older than the TTL before looking at them.
pub struct FileCache {
    /// Directory where cached values are stored
    cache_dir: PathBuf,
    /// Maximum age of a value, zero disables expiration
    ttl: Duration,
    /// Suffix source for temporary file names
    write_seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl FileCache {
    /// Create a new file cache rooted at `cache_dir`
    pub fn new(cache_dir: PathBuf, ttl: Duration) -> Self {
        Self {
            cache_dir,
            ttl,
            write_seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Initialize the cache by ensuring the cache directory exists
    pub async fn init(&self) -> Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder.create(&self.cache_dir).await?;
        info!(cache_dir = ?self.cache_dir, "Cache initialized");
        Ok(())
    }

    /// Whether a live value exists for `key`
    pub async fn has(&self, key: &str) -> bool {
        self.expire_if_stale(key).await;
        let Ok(path) = self.path_for(key) else {
            return false;
        };
        matches!(fs::metadata(&path).await, Ok(meta) if meta.is_file())
    }

    /// Read the raw bytes stored under `key`
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.expire_if_stale(key).await;
        let path = self.path_for(key).ok()?;

        match fs::read(&path).await {
            Ok(data) => Some(data),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cached value");
                None
            }
        }
    }

    /// Read a decimal integer stored under `key`
    pub async fn get_int(&self, key: &str) -> Option<i64> {
        let data = self.get(key).await?;
        std::str::from_utf8(&data).ok()?.parse().ok()
    }

    /// Read a header map stored under `key`
    pub async fn get_headers(&self, key: &str) -> Option<HeaderMap> {
        let data = self.get(key).await?;
        decode_headers(&data)
    }

    /// Store raw bytes under `key`, replacing any previous value.
    ///
    /// The value is written to a temporary file and renamed into place, so a
    /// concurrent reader sees either the old value or the new one.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = self.cache_dir.join(format!(
            ".{}.{}.{}.tmp",
            key,
            std::process::id(),
            self.write_seq.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = fs::write(&tmp_path, value).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(key = %key, size = value.len(), "Stored cache value");
        Ok(())
    }

    pub async fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, value.to_string().as_bytes()).await
    }

    pub async fn set_headers(&self, key: &str, headers: &HeaderMap) -> Result<()> {
        self.set(key, &encode_headers(headers)).await
    }

    /// Whether all three values of the entry `key` are present and live
    pub async fn has_entry(&self, key: &str) -> bool {
        self.has(key).await
            && self.has(&status_key(key)).await
            && self.has(&headers_key(key)).await
    }

    /// Load a complete cached response, or `None` if any part is missing,
    /// expired or unreadable
    pub async fn get_entry(&self, key: &str) -> Option<CachedResponse> {
        let entry = self.load_entry(key).await;
        if entry.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        entry
    }

    async fn load_entry(&self, key: &str) -> Option<CachedResponse> {
        if !self.has_entry(key).await {
            return None;
        }

        let body = self.get(key).await?;
        let headers = self.get_headers(&headers_key(key)).await?;
        let status = self.get_int(&status_key(key)).await?;
        let status = u16::try_from(status)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())?;

        Some(CachedResponse {
            status,
            headers,
            body,
        })
    }

    /// Store a complete response under `key`.
    ///
    /// The status is written last so the entry only becomes visible to
    /// [`FileCache::has_entry`] once the body and headers are in place.
    pub async fn put_entry(&self, key: &str, response: &CachedResponse) -> Result<()> {
        self.set(key, &response.body).await?;
        self.set_headers(&headers_key(key), &response.headers).await?;
        self.set_int(&status_key(key), i64::from(response.status.as_u16()))
            .await?;
        debug!(
            key = %key,
            status = %response.status,
            size = response.body.len(),
            "Cached response"
        );
        Ok(())
    }

    /// Delete every value belonging to the entry that `key` is part of
    pub async fn remove_entry(&self, key: &str) {
        for sibling in sibling_keys(key) {
            let Ok(path) = self.path_for(&sibling) else {
                continue;
            };
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(key = %sibling, error = %e, "Failed to remove cached value"),
            }
        }
    }

    /// Remove everything in the cache directory.
    ///
    /// Fails only if the directory cannot be listed. Individual removal
    /// failures are logged and skipped. Returns the number of removed items.
    pub async fn clear_all(&self) -> Result<usize> {
        let mut dir = fs::read_dir(&self.cache_dir).await?;
        let mut removed = 0;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let result = if is_dir {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };

            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = ?path, error = %e, "Failed to remove cache item"),
            }
        }

        info!(cache_dir = ?self.cache_dir, removed, "Cache cleared");
        Ok(removed)
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }

    async fn expire_if_stale(&self, key: &str) {
        if self.ttl.is_zero() {
            return;
        }
        let Ok(path) = self.path_for(key) else {
            return;
        };
        let Ok(metadata) = fs::metadata(&path).await else {
            return;
        };

        if is_stale(&metadata, self.ttl) {
            debug!(key = %key, ttl = ?self.ttl, "Cache entry expired");
            self.expired.fetch_add(1, Ordering::Relaxed);
            self.remove_entry(logical_key(key)).await;
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\'])
            || key.contains('\0')
        {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.cache_dir.join(key))
    }
}

/// Whether a file's last modification is more than `ttl` ago
pub(crate) fn is_stale(metadata: &Metadata, ttl: Duration) -> bool {
    metadata
        .modified()
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age > ttl)
        .unwrap_or(false)
}
