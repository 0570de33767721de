//! Video Orchestrator - per-request cache/fetch control flow
//!
//! ```text
//! request ──► cache open ──hit──► serve (HIT)
//!                │
//!               miss
//!                ▼
//!        FetchCoordinator slot for id
//!                │
//!        cache open again ──hit──► serve (HIT, filled by the previous holder)
//!                │
//!               miss
//!                ▼
//!        resolve metadata ──none──► 404
//!                ▼
//!        download to staging (bounded by fetch_timeout) ──error──► 502 / 504
//!                ▼
//!        admit + evict ──► serve (MISS)
//! ```
//!
//! Every failure is terminal for the request. Staged files and in-flight
//! slots are released by their guards on every exit path.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cache::{CacheIndex, CachedVideo, FetchCoordinator};
use crate::services::{MetadataResolver, RemoteFetcher};
use crate::types::{parse_video_id, GatewayError, Result, VideoId};

/// Whether a response was served from the cache or fetched for this request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A video ready to be streamed to the client
#[derive(Debug)]
pub struct ServedVideo {
    pub video: CachedVideo,
    pub status: CacheStatus,
}

#[derive(Default)]
struct OrchestratorCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    bytes_fetched: AtomicU64,
}

/// Public statistics
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub bytes_fetched: u64,
}

/// Composes cache, coordinator, resolver and fetcher
pub struct VideoOrchestrator {
    cache: Arc<CacheIndex>,
    coordinator: Arc<FetchCoordinator>,
    resolver: Arc<dyn MetadataResolver>,
    fetcher: Arc<dyn RemoteFetcher>,
    fetch_timeout: Duration,
    counters: OrchestratorCounters,
}

impl VideoOrchestrator {
    pub fn new(
        cache: Arc<CacheIndex>,
        coordinator: Arc<FetchCoordinator>,
        resolver: Arc<dyn MetadataResolver>,
        fetcher: Arc<dyn RemoteFetcher>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            coordinator,
            resolver,
            fetcher,
            fetch_timeout,
            counters: OrchestratorCounters::default(),
        }
    }

    /// Serve a video by its raw path segment
    pub async fn serve(&self, raw_id: &str) -> Result<ServedVideo> {
        let id = parse_video_id(raw_id)?;
        self.serve_video(id).await
    }

    /// Serve a video, fetching and caching it on a miss
    pub async fn serve_video(&self, id: VideoId) -> Result<ServedVideo> {
        if let Some(video) = self.cache.open(id).await? {
            return Ok(self.hit(video));
        }

        debug!(video_id = id, "Cache miss");
        self.coordinator
            .with_exclusive_fetch(id, || self.fetch_and_admit(id))
            .await
    }

    async fn fetch_and_admit(&self, id: VideoId) -> Result<ServedVideo> {
        // A previous holder of this slot may have just admitted the video
        if let Some(video) = self.cache.open(id).await? {
            debug!(video_id = id, "Filled by concurrent fetch");
            return Ok(self.hit(video));
        }

        let metadata = self.resolver.resolve(id).await?;
        let staged = self.cache.stage(id);
        let start = Instant::now();

        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher.fetch(&metadata.storage_key, staged.path()),
        )
        .await;

        let bytes = match fetched {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(video_id = id, storage_key = %metadata.storage_key, error = %e, "Fetch failed");
                return Err(e);
            }
            Err(_) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    video_id = id,
                    storage_key = %metadata.storage_key,
                    timeout_secs = self.fetch_timeout.as_secs_f64(),
                    "Fetch timed out"
                );
                return Err(GatewayError::FetchTimeout(self.fetch_timeout));
            }
        };
        self.counters.bytes_fetched.fetch_add(bytes, Ordering::Relaxed);

        let video = self.cache.admit(id, &metadata.storage_key, staged).await?;
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        info!(
            video_id = id,
            storage_key = %metadata.storage_key,
            bytes = video.len,
            duration_ms = start.elapsed().as_millis() as u64,
            "Video cached"
        );

        Ok(ServedVideo {
            video,
            status: CacheStatus::Miss,
        })
    }

    fn hit(&self, video: CachedVideo) -> ServedVideo {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!(video_id = video.id, "Cache hit");
        ServedVideo {
            video,
            status: CacheStatus::Hit,
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Relaxed),
            bytes_fetched: self.counters.bytes_fetched.load(Ordering::Relaxed),
        }
    }

    pub fn cache(&self) -> &Arc<CacheIndex> {
        &self.cache
    }

    pub fn coordinator(&self) -> &Arc<FetchCoordinator> {
        &self.coordinator
    }
}
