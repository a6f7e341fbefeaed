//! Command-line and environment configuration

use crate::error::{ProxyError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Command-line arguments for the caching proxy
#[derive(Debug, Parser)]
#[command(name = "caching-proxy", version, about = "Caching HTTP proxy server")]
pub struct Cli {
    /// Port on which the caching proxy server will run.
    #[arg(
        long,
        env = "CACHING_PROXY_PORT",
        value_parser = clap::value_parser!(u16).range(1..),
        required_unless_present = "clear_cache"
    )]
    pub port: Option<u16>,

    /// URL of the server to which the requests will be forwarded.
    #[arg(
        long,
        env = "CACHING_PROXY_ORIGIN",
        value_name = "URL",
        required_unless_present = "clear_cache"
    )]
    pub origin: Option<String>,

    /// Host on which the caching proxy server will run.
    #[arg(long, env = "CACHING_PROXY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Generate unique cache per user (based on User-Agent and cookies).
    #[arg(long = "unique", env = "CACHING_PROXY_UNIQUE")]
    pub unique_by_user: bool,

    /// Duration to keep cached responses before expiration (e.g. 10s, 5m, 1h).
    #[arg(
        long,
        env = "CACHING_PROXY_CACHE_TIMEOUT",
        value_name = "DURATION",
        value_parser = humantime::parse_duration
    )]
    pub cache_timeout: Option<Duration>,

    /// How often expired files are swept from disk. Defaults to the cache timeout.
    #[arg(
        long,
        env = "CACHING_PROXY_SWEEP_INTERVAL",
        value_name = "DURATION",
        value_parser = humantime::parse_duration
    )]
    pub sweep_interval: Option<Duration>,

    /// Directory to store cached responses in.
    #[arg(
        long,
        env = "CACHING_PROXY_CACHE_FOLDER",
        value_name = "PATH",
        default_value = "./cache"
    )]
    pub cache_folder: PathBuf,

    /// Clear the cache of the proxy server and exit.
    #[arg(long)]
    pub clear_cache: bool,
}

/// What the process should do after parsing its arguments
#[derive(Debug, Clone)]
pub enum Command {
    /// Serve proxied traffic
    Serve(ProxyConfig),
    /// Empty the cache directory and exit
    ClearCache { cache_dir: PathBuf },
}

/// Validated configuration for the proxy server
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub origin: Url,
    pub unique_by_user: bool,
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,
    pub cache_dir: PathBuf,
}

impl ProxyConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Cli {
    /// Validate the parsed arguments
    pub fn into_command(self) -> Result<Command> {
        if self.clear_cache {
            return Ok(Command::ClearCache {
                cache_dir: self.cache_folder,
            });
        }

        let port = self
            .port
            .ok_or_else(|| ProxyError::Config("--port is required".to_string()))?;
        let origin = self
            .origin
            .ok_or_else(|| ProxyError::Config("--origin is required".to_string()))?;
        let origin = parse_origin(&origin)?;

        let cache_ttl = self.cache_timeout.unwrap_or(Duration::ZERO);

        Ok(Command::Serve(ProxyConfig {
            host: self.host,
            port,
            origin,
            unique_by_user: self.unique_by_user,
            cache_ttl,
            sweep_interval: self.sweep_interval.unwrap_or(cache_ttl),
            cache_dir: self.cache_folder,
        }))
    }
}

/// Parse an origin URL, accepting only an http(s) scheme and an authority.
///
/// A path (other than the implicit `/`), query or fragment is rejected.
pub fn parse_origin(origin: &str) -> Result<Url> {
    let invalid = || {
        ProxyError::Config(format!(
            "Invalid origin URL '{}'. Only protocol (http, https) and domain are allowed, no path, query, or fragment.",
            origin
        ))
    };

    let url = Url::parse(origin).map_err(|_| invalid())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(invalid());
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid());
    }

    Ok(url)
}
