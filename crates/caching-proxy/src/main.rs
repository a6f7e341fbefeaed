//! Caching Proxy - transparent HTTP cache in front of a single origin
//!
//! Forwards requests to the configured origin and keeps responses to safe
//! requests in a file-based cache, answering repeat requests from disk.

mod config;
mod error;
mod forward;
mod inflight;
mod key;
mod server;
#[cfg(test)]
mod test_support;
mod types;

use crate::config::{Cli, Command, ProxyConfig};
use crate::error::Result;
use crate::forward::OriginForwarder;
use crate::server::{start_server, ServerState, SharedState};
use clap::Parser;
use file_response_cache::{FileCache, Sweeper};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("caching_proxy=info".parse()?)
        .add_directive("file_response_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    match Cli::parse().into_command()? {
        Command::ClearCache { cache_dir } => {
            info!("Clearing cache in {:?}", cache_dir);
            let cache = FileCache::new(cache_dir, Duration::ZERO);
            cache.init().await?;
            cache.clear_all().await?;
            Ok(())
        }
        Command::Serve(config) => serve(config).await,
    }
}

async fn serve(config: ProxyConfig) -> Result<()> {
    info!("Starting caching proxy...");
    info!("Origin: {}", config.origin);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Unique cache per user: {}", config.unique_by_user);

    let cache = Arc::new(FileCache::new(config.cache_dir.clone(), config.cache_ttl));
    cache.init().await?;
    if cache.ttl().is_zero() {
        info!("Cache TTL: disabled, entries never expire");
    } else {
        info!("Cache TTL: {:?}", cache.ttl());
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let sweeper = Sweeper::new(
        config.cache_dir.clone(),
        config.cache_ttl,
        config.sweep_interval,
    );
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_tx.subscribe()));

    let forwarder = OriginForwarder::new(config.origin.clone())?;
    let state: SharedState = Arc::new(ServerState::new(
        cache.clone(),
        forwarder,
        config.unique_by_user,
    ));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = signal_tx.send(());
    });

    let mut server_shutdown = shutdown_tx.subscribe();
    start_server(state, &config.listen_addr(), async move {
        let _ = server_shutdown.recv().await;
    })
    .await?;

    // Stop the sweeper as well if the server exited on its own
    let _ = shutdown_tx.send(());
    if let Err(e) = sweeper_handle.await {
        warn!("Cache sweeper task failed: {}", e);
    }

    let stats = cache.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        expired = stats.expired,
        "Caching proxy stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
