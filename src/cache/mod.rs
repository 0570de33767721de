//! Local video cache
//!
//! - [`CacheIndex`]: bounded FIFO index owning the cache directory
//! - [`FetchCoordinator`]: per-id exclusivity for remote fetches

pub mod coordinator;
pub mod index;

pub use coordinator::FetchCoordinator;
pub use index::{CacheConfig, CacheEntry, CacheIndex, CachedVideo, StagedFile};
