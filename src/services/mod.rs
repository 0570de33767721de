//! Services composed by the video route

pub mod fetcher;
pub mod metadata;
pub mod video_orchestrator;

pub use fetcher::{RemoteFetcher, SkynetConfig, SkynetFetcher};
pub use metadata::{InMemoryMetadataResolver, MetadataResolver, MongoMetadataResolver};
pub use video_orchestrator::{CacheStatus, OrchestratorStats, ServedVideo, VideoOrchestrator};
