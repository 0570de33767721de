//! Video gateway integration tests
//!
//! Drives the orchestrator and the HTTP router with in-memory collaborators:
//! - cache hits and misses
//! - fetch deduplication under concurrency
//! - FIFO eviction and re-fetch after eviction
//! - error paths (bad id, missing metadata, fetch failure, timeout)

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use http_body_util::BodyExt;
use hyper::{Method, StatusCode};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

use video_gateway::cache::{CacheConfig, CacheIndex, FetchCoordinator};
use video_gateway::server::{route, AppState};
use video_gateway::services::{
    CacheStatus, InMemoryMetadataResolver, MetadataResolver, RemoteFetcher, ServedVideo,
    VideoOrchestrator,
};
use video_gateway::types::{GatewayError, Result, VideoId, VideoMetadata};
use video_gateway::Args;

// =============================================================================
// Test collaborators
// =============================================================================

/// Resolver that counts lookups
struct CountingResolver {
    inner: InMemoryMetadataResolver,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl MetadataResolver for CountingResolver {
    async fn resolve(&self, id: VideoId) -> Result<VideoMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(id).await
    }
}

/// Fetcher that writes `content:{key}` after an optional delay
struct MockFetcher {
    calls: AtomicUsize,
    delay: Duration,
    fail: AtomicBool,
}

impl MockFetcher {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            fail: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteFetcher for MockFetcher {
    async fn fetch(&self, storage_key: &str, destination: &Path) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Partial write first, so failures leave something to clean up
        tokio::fs::write(destination, b"partial").await?;
        tokio::time::sleep(self.delay).await;

        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::FetchFailure(format!(
                "portal returned 502 for {}",
                storage_key
            )));
        }

        let body = format!("content:{}", storage_key);
        tokio::fs::write(destination, &body).await?;
        Ok(body.len() as u64)
    }
}

struct Harness {
    _dir: TempDir,
    state: Arc<AppState>,
    resolver: Arc<CountingResolver>,
    fetcher: Arc<MockFetcher>,
}

impl Harness {
    async fn new(max_cached: usize, fetch_delay: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cached");
        let max = max_cached.to_string();
        let args = Args::try_parse_from([
            "video-gateway",
            "--port",
            "127.0.0.1:0",
            "--cache-dir",
            cache_dir.to_str().unwrap(),
            "--max-cached-videos",
            max.as_str(),
            "--fetch-timeout-secs",
            "5",
        ])
        .unwrap();

        let resolver = Arc::new(CountingResolver {
            inner: InMemoryMetadataResolver::new(),
            calls: AtomicUsize::new(0),
        });
        for id in 1..=5 {
            resolver.inner.insert(id, format!("skylink-{}", id)).await;
        }
        let fetcher = Arc::new(MockFetcher::new(fetch_delay));

        let state = AppState::new(args, resolver.clone(), fetcher.clone());
        state.cache.prepare().await.unwrap();

        Self {
            _dir: dir,
            state: Arc::new(state),
            resolver,
            fetcher,
        }
    }

    fn staging_files(&self) -> usize {
        std::fs::read_dir(self.state.cache.config().dir.join(".staging"))
            .unwrap()
            .count()
    }
}

async fn read_body(served: ServedVideo) -> String {
    let mut file = served.video.file;
    let mut body = String::new();
    file.read_to_string(&mut body).await.unwrap();
    body
}

// =============================================================================
// Cache behaviour
// =============================================================================

#[tokio::test]
async fn test_second_request_is_cache_hit() {
    let h = Harness::new(10, Duration::ZERO).await;

    let first = h.state.videos.serve("1").await.unwrap();
    assert_eq!(first.status, CacheStatus::Miss);
    assert_eq!(read_body(first).await, "content:skylink-1");

    let second = h.state.videos.serve("1").await.unwrap();
    assert_eq!(second.status, CacheStatus::Hit);
    assert_eq!(read_body(second).await, "content:skylink-1");

    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_share_one_fetch() {
    let h = Harness::new(10, Duration::from_millis(100)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = Arc::clone(&h.state);
        handles.push(tokio::spawn(async move {
            let served = state.videos.serve_video(2).await.unwrap();
            read_body(served).await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), "content:skylink-2");
    }
    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(h.state.cache.snapshot().await, vec![2]);
    assert_eq!(h.state.coordinator.in_flight_count(), 0);
}

#[tokio::test]
async fn test_fifo_eviction_scenario() {
    let h = Harness::new(2, Duration::ZERO).await;

    h.state.videos.serve_video(1).await.unwrap();
    assert_eq!(h.state.cache.snapshot().await, vec![1]);

    h.state.videos.serve_video(2).await.unwrap();
    assert_eq!(h.state.cache.snapshot().await, vec![1, 2]);

    h.state.videos.serve_video(3).await.unwrap();
    assert_eq!(h.state.cache.snapshot().await, vec![2, 3]);
    assert!(!h.state.cache.path_for(1).exists());

    // Evicted video behaves as a fresh miss
    let again = h.state.videos.serve_video(1).await.unwrap();
    assert_eq!(again.status, CacheStatus::Miss);
    assert_eq!(h.fetcher.calls(), 4);
    assert_eq!(h.state.cache.snapshot().await, vec![3, 1]);
    assert!(!h.state.cache.path_for(2).exists());
}

#[tokio::test]
async fn test_hit_does_not_protect_from_eviction() {
    let h = Harness::new(2, Duration::ZERO).await;

    h.state.videos.serve_video(1).await.unwrap();
    h.state.videos.serve_video(2).await.unwrap();
    let hit = h.state.videos.serve_video(1).await.unwrap();
    assert_eq!(hit.status, CacheStatus::Hit);

    h.state.videos.serve_video(3).await.unwrap();
    assert_eq!(h.state.cache.snapshot().await, vec![2, 3]);
}

// =============================================================================
// Error paths
// =============================================================================

#[tokio::test]
async fn test_invalid_id_has_no_side_effects() {
    let h = Harness::new(2, Duration::ZERO).await;

    let result = h.state.videos.serve("abc").await;
    assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.fetcher.calls(), 0);
    assert!(h.state.cache.is_empty().await);
}

#[tokio::test]
async fn test_missing_metadata_leaves_cache_unchanged() {
    let h = Harness::new(2, Duration::ZERO).await;
    h.state.videos.serve_video(1).await.unwrap();

    let result = h.state.videos.serve_video(404).await;
    assert!(matches!(result, Err(GatewayError::MetadataNotFound(404))));
    assert_eq!(h.state.cache.snapshot().await, vec![1]);
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_fetch_failure_cleans_up_and_allows_retry() {
    let h = Harness::new(2, Duration::ZERO).await;
    h.fetcher.fail.store(true, Ordering::SeqCst);

    let result = h.state.videos.serve_video(1).await;
    assert!(matches!(result, Err(GatewayError::FetchFailure(_))));
    assert!(h.state.cache.is_empty().await);
    assert_eq!(h.staging_files(), 0);
    assert!(!h.state.cache.path_for(1).exists());
    assert_eq!(h.state.coordinator.in_flight_count(), 0);

    h.fetcher.fail.store(false, Ordering::SeqCst);
    let served = h.state.videos.serve_video(1).await.unwrap();
    assert_eq!(served.status, CacheStatus::Miss);
    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_fetch_timeout_releases_slot() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(CacheIndex::new(CacheConfig::new(dir.path().join("cached"), 2)));
    cache.prepare().await.unwrap();
    let coordinator = Arc::new(FetchCoordinator::new());
    let resolver = Arc::new(InMemoryMetadataResolver::new());
    resolver.insert(1, "skylink-slow").await;
    let fetcher = Arc::new(MockFetcher::new(Duration::from_secs(30)));

    let orchestrator = VideoOrchestrator::new(
        Arc::clone(&cache),
        Arc::clone(&coordinator),
        resolver,
        fetcher.clone(),
        Duration::from_millis(50),
    );

    let result = orchestrator.serve_video(1).await;
    assert!(matches!(result, Err(GatewayError::FetchTimeout(_))));
    assert_eq!(coordinator.in_flight_count(), 0);
    assert!(cache.is_empty().await);
    assert_eq!(
        std::fs::read_dir(dir.path().join("cached").join(".staging"))
            .unwrap()
            .count(),
        0
    );
    assert_eq!(orchestrator.stats().fetch_failures, 1);
}

// =============================================================================
// HTTP routes
// =============================================================================

async fn body_string(response: hyper::Response<video_gateway::server::ResponseBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_route_serves_video_with_consistent_headers() {
    let h = Harness::new(2, Duration::ZERO).await;

    let first = route(&h.state, &Method::GET, "/videos/1").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-cache"], "MISS");
    assert_eq!(first.headers()["content-disposition"], "inline; filename=\"1\"");
    assert_eq!(first.headers()["content-length"], "17");
    assert_eq!(body_string(first).await, "content:skylink-1");

    let second = route(&h.state, &Method::GET, "/videos/1").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(second.headers()["content-disposition"], "inline; filename=\"1\"");
    assert_eq!(body_string(second).await, "content:skylink-1");
}

#[tokio::test]
async fn test_route_error_statuses() {
    let h = Harness::new(2, Duration::ZERO).await;

    let bad = route(&h.state, &Method::GET, "/videos/abc").await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let missing = route(&h.state, &Method::GET, "/videos/404").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(missing).await, "Video not found.");

    h.fetcher.fail.store(true, Ordering::SeqCst);
    let failed = route(&h.state, &Method::GET, "/videos/1").await;
    assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);

    let wrong_method = route(&h.state, &Method::POST, "/videos/1").await;
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);

    let unknown = route(&h.state, &Method::GET, "/nope").await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    assert!(h.state.cache.is_empty().await);
}

#[tokio::test]
async fn test_health_reports_cache_occupancy() {
    let h = Harness::new(3, Duration::ZERO).await;
    h.state.videos.serve_video(1).await.unwrap();
    h.state.videos.serve_video(1).await.unwrap();

    let response = route(&h.state, &Method::GET, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let health: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(health["healthy"], true);
    assert_eq!(health["cache"]["entries"], 1);
    assert_eq!(health["cache"]["max_entries"], 3);
    assert_eq!(health["cache"]["in_flight"], 0);
    assert_eq!(health["requests"]["hits"], 1);
    assert_eq!(health["requests"]["misses"], 1);
}
