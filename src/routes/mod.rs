//! HTTP routes for the video gateway

pub mod health;
pub mod videos;

pub use health::{health_check, version_info};
pub use videos::{error_response, handle_video_request, video_response};
