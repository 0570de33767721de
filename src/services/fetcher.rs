//! Remote Fetcher - downloads videos from a Skynet portal
//!
//! `GET {portal}/{skylink}` streamed straight to disk. The destination is a
//! staging path handed out by the cache index; nothing becomes visible in
//! the cache directory until the index admits the finished file. Failed
//! downloads are not retried here.

use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::types::{GatewayError, Result};

/// Trait for fetching objects from the remote store (allows mocking in tests)
#[async_trait::async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Download the object behind `storage_key` into `destination`.
    ///
    /// On success the file is complete and synced. On error the file may be
    /// partial; the caller owns its cleanup.
    async fn fetch(&self, storage_key: &str, destination: &Path) -> Result<u64>;
}

/// Configuration for the Skynet fetcher
#[derive(Debug, Clone)]
pub struct SkynetConfig {
    /// Portal base URL, e.g. `https://siasky.net`
    pub portal_url: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl SkynetConfig {
    pub fn new(portal_url: impl Into<String>) -> Self {
        Self {
            portal_url: portal_url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Fetches skylinks over HTTP from a Skynet portal
pub struct SkynetFetcher {
    http_client: reqwest::Client,
    config: SkynetConfig,
}

impl SkynetFetcher {
    pub fn new(config: SkynetConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Portal URL for a skylink; accepts both bare and `sia://` forms
    pub fn object_url(&self, storage_key: &str) -> String {
        let skylink = storage_key.strip_prefix("sia://").unwrap_or(storage_key);
        format!(
            "{}/{}",
            self.config.portal_url.trim_end_matches('/'),
            skylink.trim_start_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl RemoteFetcher for SkynetFetcher {
    async fn fetch(&self, storage_key: &str, destination: &Path) -> Result<u64> {
        let url = self.object_url(storage_key);
        let start = Instant::now();
        debug!(storage_key = %storage_key, url = %url, "Fetching from portal");

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::FetchFailure(format!(
                "portal returned {} for {}",
                status, storage_key
            )));
        }

        let mut file = File::create(destination).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        info!(
            storage_key = %storage_key,
            bytes = written,
            time_ms = start.elapsed().as_millis() as u64,
            "Downloaded video from portal"
        );
        Ok(written)
    }
}
