//! Video metadata document schema

use serde::{Deserialize, Serialize};

use crate::types::{VideoId, VideoMetadata};

/// Collection name for video metadata
pub const VIDEO_METADATA_COLLECTION: &str = "video_metadata";

/// Video metadata document stored in MongoDB
///
/// Only the fields the gateway needs are declared; anything else on the
/// document is ignored on decode.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct VideoDoc {
    /// Video id, used as the document id
    pub _id: VideoId,

    /// Skylink of the uploaded video
    #[serde(alias = "storagekey")]
    pub storage_key: String,
}

impl From<VideoDoc> for VideoMetadata {
    fn from(doc: VideoDoc) -> Self {
        Self {
            id: doc._id,
            storage_key: doc.storage_key,
        }
    }
}
