//! Database schemas for the video gateway
//!
//! Documents are written by the upload pipeline; the gateway only reads them.

mod video;

pub use video::{VideoDoc, VIDEO_METADATA_COLLECTION};
