//! Error types for the video gateway

use hyper::StatusCode;
use std::time::Duration;

use crate::types::VideoId;

/// Main error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The video id in the request path did not parse
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No metadata record exists for the id
    #[error("Video not found: {0}")]
    MetadataNotFound(VideoId),

    /// The document store could not be reached or answered with an error
    #[error("Metadata backend error: {0}")]
    MetadataBackend(String),

    /// The remote store failed to deliver the object
    #[error("Fetch failed: {0}")]
    FetchFailure(String),

    #[error("Fetch timed out after {0:?}")]
    FetchTimeout(Duration),

    /// Deleting an evicted file failed; the entry has already left the index
    #[error("Eviction of video {video_id} failed: {message}")]
    EvictionIo { video_id: VideoId, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MetadataNotFound(_) => StatusCode::NOT_FOUND,
            Self::MetadataBackend(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::FetchFailure(_) => StatusCode::BAD_GATEWAY,
            Self::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::EvictionIo { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body text shown to clients. Server-side details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::MetadataNotFound(_) => "Video not found.".to_string(),
            Self::InvalidRequest(_) => self.to_string(),
            _ => self
                .status_code()
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        (self.status_code(), self.public_message())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<mongodb::error::Error> for GatewayError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::MetadataBackend(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::FetchFailure(err.to_string())
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
