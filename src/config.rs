//! Configuration for the video gateway
//!
//! CLI arguments and environment variable handling using clap.
//! The three deployment variables inherited from earlier releases keep their lowercase names
//! (`port`, `mongo_uri`, `max_cached_videos`).

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Cache size used when `max_cached_videos` is unset or invalid
pub const DEFAULT_MAX_CACHED_VIDEOS: usize = 10;

/// Public Skynet portal used when none is configured
pub const DEFAULT_PORTAL_URL: &str = "https://siasky.net";

/// Video gateway - serves Skynet-hosted videos from a bounded local cache
#[derive(Parser, Debug, Clone)]
#[command(name = "video-gateway")]
#[command(about = "Caching gateway for Skynet-hosted videos")]
pub struct Args {
    /// Listen address: ":8080", "8080" or "127.0.0.1:8080"
    #[arg(long, env = "port", default_value = ":8080")]
    pub port: String,

    /// MongoDB connection URI
    #[arg(long, env = "mongo_uri", default_value = "mongodb://localhost:27017")]
    pub mongo_uri: String,

    /// MongoDB database holding the video_metadata collection
    #[arg(long, env = "MONGO_DB", default_value = "blue")]
    pub mongo_db: String,

    /// Maximum number of cached videos (falls back to 10 when unset or invalid)
    #[arg(long, env = "max_cached_videos")]
    pub max_cached_videos: Option<String>,

    /// Directory holding cached video files
    #[arg(long, env = "CACHE_DIR", default_value = "cached")]
    pub cache_dir: PathBuf,

    /// Skynet portal base URL
    #[arg(long, env = "SKYNET_PORTAL_URL", default_value = DEFAULT_PORTAL_URL)]
    pub skynet_portal_url: String,

    /// Upper bound on a single remote download, in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "300")]
    pub fetch_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Resolve the listen address from `port`
    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        parse_listen_addr(&self.port)
    }

    /// Effective cache bound
    pub fn max_cached_videos(&self) -> usize {
        self.max_cached_videos
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_MAX_CACHED_VIDEOS)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.listen_addr()?;

        if !self.skynet_portal_url.starts_with("http://")
            && !self.skynet_portal_url.starts_with("https://")
        {
            return Err(format!(
                "SKYNET_PORTAL_URL must be an http(s) URL, got '{}'",
                self.skynet_portal_url
            ));
        }

        if self.fetch_timeout_secs == 0 {
            return Err("FETCH_TIMEOUT_SECS must be greater than zero".to_string());
        }

        Ok(())
    }
}

/// Accepts the Go-style ":8080" form, a bare port, or a full socket address
fn parse_listen_addr(raw: &str) -> Result<SocketAddr, String> {
    let raw = raw.trim();
    let candidate = if let Some(port) = raw.strip_prefix(':') {
        format!("0.0.0.0:{}", port)
    } else if raw.parse::<u16>().is_ok() {
        format!("0.0.0.0:{}", raw)
    } else {
        raw.to_string()
    };

    candidate
        .parse()
        .map_err(|e| format!("invalid listen address '{}': {}", raw, e))
}
