//! Video delivery route
//!
//! `GET /videos/{video_id}` streams the cached file. Hits and fresh
//! fetches get the same headers: `Content-Disposition: inline` and an
//! `X-Cache` marker telling them apart.

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{self, HeaderValue};
use hyper::Response;
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

use crate::server::http::to_boxed;
use crate::server::{AppState, ResponseBody};
use crate::services::ServedVideo;
use crate::types::GatewayError;

/// Handle `GET /videos/{raw_id}`
pub async fn handle_video_request(state: &AppState, raw_id: &str) -> Response<ResponseBody> {
    match state.videos.serve(raw_id).await {
        Ok(served) => video_response(served),
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(raw_id = raw_id, error = %err, "Video request failed");
            } else {
                warn!(raw_id = raw_id, error = %err, "Video request rejected");
            }
            to_boxed(error_response(&err))
        }
    }
}

/// Stream a served video
pub fn video_response(served: ServedVideo) -> Response<ResponseBody> {
    let ServedVideo { video, status } = served;

    let stream = ReaderStream::new(video.file).map_ok(Frame::data);
    let mut response = Response::new(StreamBody::new(stream).boxed_unsync());

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(video.len));
    if let Ok(disposition) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", video.id)) {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    headers.insert("x-cache", HeaderValue::from_static(status.as_str()));

    response
}

/// Plain-text error response
pub fn error_response(err: &GatewayError) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(err.public_message())));
    *response.status_mut() = err.status_code();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
