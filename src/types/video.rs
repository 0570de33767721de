//! Video identifiers and metadata

use crate::types::{GatewayError, Result};

/// Client-supplied video identifier
pub type VideoId = i64;

/// Resolved metadata for a video. Only the storage key is used by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub id: VideoId,
    /// Content-addressed key (skylink) of the video in the remote store
    pub storage_key: String,
}

/// Parse a base-10 video id from a request path segment
pub fn parse_video_id(raw: &str) -> Result<VideoId> {
    raw.parse::<VideoId>()
        .map_err(|e| GatewayError::InvalidRequest(format!("invalid video id '{}': {}", raw, e)))
}
