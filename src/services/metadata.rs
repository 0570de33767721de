//! Metadata Resolver - video id to storage key
//!
//! Single point lookup `{ _id: id }` in the `video_metadata` collection.
//! A missing record and an unreachable database are different errors: the
//! first is a 404 for the client, the second a transient backend failure.

use std::collections::HashMap;

use bson::doc;
use mongodb::Collection;
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::schemas::{VideoDoc, VIDEO_METADATA_COLLECTION};
use crate::db::MongoClient;
use crate::types::{GatewayError, Result, VideoId, VideoMetadata};

/// Trait for resolving video metadata (allows mocking in tests)
#[async_trait::async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Look up the metadata record for `id`
    async fn resolve(&self, id: VideoId) -> Result<VideoMetadata>;
}

// ============================================================================
// MongoDB resolver
// ============================================================================

/// Resolver backed by the `video_metadata` collection
pub struct MongoMetadataResolver {
    collection: Collection<VideoDoc>,
}

impl MongoMetadataResolver {
    pub fn new(mongo: &MongoClient) -> Self {
        Self {
            collection: mongo.collection(VIDEO_METADATA_COLLECTION),
        }
    }
}

#[async_trait::async_trait]
impl MetadataResolver for MongoMetadataResolver {
    async fn resolve(&self, id: VideoId) -> Result<VideoMetadata> {
        let video = self
            .collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| GatewayError::MetadataBackend(format!("lookup of video {} failed: {}", id, e)))?
            .ok_or(GatewayError::MetadataNotFound(id))?;

        debug!(video_id = id, storage_key = %video.storage_key, "Resolved video metadata");
        Ok(video.into())
    }
}

// ============================================================================
// In-memory resolver
// ============================================================================

/// In-memory resolver for development and tests
#[derive(Default)]
pub struct InMemoryMetadataResolver {
    videos: RwLock<HashMap<VideoId, String>>,
}

impl InMemoryMetadataResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: VideoId, storage_key: impl Into<String>) {
        self.videos.write().await.insert(id, storage_key.into());
    }
}

#[async_trait::async_trait]
impl MetadataResolver for InMemoryMetadataResolver {
    async fn resolve(&self, id: VideoId) -> Result<VideoMetadata> {
        self.videos
            .read()
            .await
            .get(&id)
            .map(|storage_key| VideoMetadata {
                id,
                storage_key: storage_key.clone(),
            })
            .ok_or(GatewayError::MetadataNotFound(id))
    }
}
