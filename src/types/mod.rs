//! Shared types for the video gateway

mod error;
mod video;

pub use error::{GatewayError, Result};
pub use video::{parse_video_id, VideoId, VideoMetadata};
