//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo; one task per connection.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::cache::{CacheConfig, CacheIndex, FetchCoordinator};
use crate::config::Args;
use crate::routes;
use crate::services::{MetadataResolver, RemoteFetcher, VideoOrchestrator};
use crate::types::GatewayError;

/// Response body: buffered for small responses, streamed for video files
pub type ResponseBody = http_body_util::combinators::UnsyncBoxBody<Bytes, std::io::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// FIFO index of cached videos
    pub cache: Arc<CacheIndex>,
    /// In-flight fetch tracking
    pub coordinator: Arc<FetchCoordinator>,
    /// Request orchestration for /videos/{id}
    pub videos: Arc<VideoOrchestrator>,
    pub started_at: Instant,
}

impl AppState {
    /// Build the state from configuration and the two remote collaborators
    pub fn new(
        args: Args,
        resolver: Arc<dyn MetadataResolver>,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> Self {
        let cache = Arc::new(CacheIndex::new(CacheConfig::new(
            args.cache_dir.clone(),
            args.max_cached_videos(),
        )));
        let coordinator = Arc::new(FetchCoordinator::new());
        let videos = Arc::new(VideoOrchestrator::new(
            Arc::clone(&cache),
            Arc::clone(&coordinator),
            resolver,
            fetcher,
            args.fetch_timeout(),
        ));

        Self {
            args,
            cache,
            coordinator,
            videos,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), GatewayError> {
    let addr = state.args.listen_addr().map_err(GatewayError::Config)?;
    let listener = TcpListener::bind(addr).await?;

    info!(
        "Video gateway listening on {} (cache: {}, max {} videos)",
        addr,
        state.cache.config().dir.display(),
        state.cache.max_entries()
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<ResponseBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    Ok(route(&state, &method, &path).await)
}

/// Dispatch a request by method and path
pub async fn route(state: &Arc<AppState>, method: &Method, path: &str) -> Response<ResponseBody> {
    if let Some(raw_id) = path.strip_prefix("/videos/") {
        if method != Method::GET {
            return to_boxed(method_not_allowed_response());
        }
        return routes::handle_video_request(state, raw_id).await;
    }

    match (method, path) {
        // Liveness probe
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            to_boxed(routes::health_check(state).await)
        }

        (&Method::GET, "/version") => to_boxed(routes::version_info()),

        _ => to_boxed(not_found_response(path)),
    }
}

/// Convert a buffered response to the shared body type
pub(crate) fn to_boxed(response: Response<Full<Bytes>>) -> Response<ResponseBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed_unsync())
}

fn method_not_allowed_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(b"Method not allowed")));
    *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    response
        .headers_mut()
        .insert(header::ALLOW, header::HeaderValue::from_static("GET"));
    response
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "hint": "Use GET /videos/{video_id}"
    });

    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
