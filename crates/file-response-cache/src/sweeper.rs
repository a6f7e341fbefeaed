//! Background task that deletes expired cache files

use crate::cache::is_stale;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Periodically walks the cache directory and removes files older than the TTL.
///
/// Complements the lazy expiration done on reads: entries that are never
/// requested again are still removed within roughly one sweep interval of
/// expiring.
pub struct Sweeper {
    cache_dir: PathBuf,
    ttl: Duration,
    interval: Duration,
}

impl Sweeper {
    /// Create a sweeper. A zero `interval` falls back to the TTL.
    pub fn new(cache_dir: PathBuf, ttl: Duration, interval: Duration) -> Self {
        let interval = if interval.is_zero() { ttl } else { interval };
        Self {
            cache_dir,
            ttl,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The main run loop. Returns immediately when no TTL is configured,
    /// otherwise sweeps until a shutdown signal is received.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        if self.ttl.is_zero() {
            info!("Cache sweeper is disabled (no cache TTL). Task will not run.");
            return;
        }
        info!(ttl = ?self.ttl, interval = ?self.interval, "Cache sweeper started");

        loop {
            let removed = self.sweep_once().await;
            if removed > 0 {
                info!(removed, "Removed expired cache files");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown_rx.recv() => {
                    info!("Cache sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Walk the cache directory once, deleting every stale file.
    /// Returns the number of files removed.
    pub async fn sweep_once(&self) -> usize {
        let mut removed = 0;
        let mut pending = vec![self.cache_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = ?dir, error = %e, "Error walking through cache directory");
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(dir = ?dir, error = %e, "Error walking through cache directory");
                        break;
                    }
                };

                let path = entry.path();
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        debug!(path = ?path, error = %e, "Skipping unreadable cache item");
                        continue;
                    }
                };

                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }

                if is_stale(&metadata, self.ttl) {
                    debug!(path = ?path, "Removing old file");
                    match fs::remove_file(&path).await {
                        Ok(()) => removed += 1,
                        Err(e) => warn!(path = ?path, error = %e, "Error removing file"),
                    }
                }
            }
        }

        removed
    }
}
