//! Cache Index - bounded FIFO set of locally cached videos
//!
//! Every cached video is one file under the cache directory, named by its
//! id. The index owns that directory: files only appear there through
//! [`CacheIndex::admit`] and only disappear through eviction, so the set of
//! files on disk always equals the index membership.
//!
//! ## Eviction
//!
//! Entries are ordered by admission. When an admission pushes the index
//! past `max_entries`, the oldest entries are popped and their files
//! deleted while the index lock is still held. A hit never reorders
//! entries (FIFO, not LRU).
//!
//! ## Staging
//!
//! Downloads land in `<cache_dir>/.staging/` first. A [`StagedFile`]
//! removes its file on drop unless it was admitted, so failed or cancelled
//! downloads never leave partial content behind.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::types::{GatewayError, Result, VideoId};

const STAGING_DIR: &str = ".staging";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the cache index
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding one file per cached video
    pub dir: PathBuf,
    /// Maximum number of entries after any completed admission
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn new(dir: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            dir: dir.into(),
            max_entries: max_entries.max(1),
        }
    }
}

// =============================================================================
// Entries
// =============================================================================

/// A cached video as recorded in the index
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub id: VideoId,
    pub path: PathBuf,
    /// Skylink the file was fetched from
    pub storage_key: String,
    /// Admission ordinal; smaller means older
    pub inserted_at: u64,
}

/// An open handle on a cached video file
///
/// The handle is opened under the index lock, so it stays readable even if
/// the entry is evicted while the response is streaming.
#[derive(Debug)]
pub struct CachedVideo {
    pub id: VideoId,
    pub path: PathBuf,
    pub file: File,
    pub len: u64,
}

/// A download destination inside the staging area
///
/// Removed on drop unless handed to [`CacheIndex::admit`].
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    armed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Discarded staged download"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to discard staged download"),
        }
    }
}

// =============================================================================
// Cache Index
// =============================================================================

struct IndexState {
    entries: VecDeque<CacheEntry>,
    next_ordinal: u64,
}

impl IndexState {
    fn position(&self, id: VideoId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }
}

/// Bounded, insertion-ordered index of cached videos
pub struct CacheIndex {
    config: CacheConfig,
    staging_dir: PathBuf,
    state: Mutex<IndexState>,
}

impl CacheIndex {
    pub fn new(config: CacheConfig) -> Self {
        info!(
            dir = %config.dir.display(),
            max_entries = config.max_entries,
            "CacheIndex initialized"
        );

        let staging_dir = config.dir.join(STAGING_DIR);
        Self {
            config,
            staging_dir,
            state: Mutex::new(IndexState {
                entries: VecDeque::new(),
                next_ordinal: 0,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn max_entries(&self) -> usize {
        self.config.max_entries
    }

    /// Create the cache directory and purge files left by a previous process.
    ///
    /// Membership is not persisted, so anything already on disk is unknown
    /// to the index and must go.
    pub async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.config.dir).await?;

        let mut purged = 0usize;
        let mut dir = fs::read_dir(&self.config.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path == self.staging_dir {
                continue;
            }
            if item.file_type().await?.is_file() {
                fs::remove_file(&path).await?;
                purged += 1;
            }
        }

        match fs::remove_dir_all(&self.staging_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.staging_dir).await?;

        let mut state = self.state.lock().await;
        state.entries.clear();

        if purged > 0 {
            info!(purged = purged, "Purged stale cache files");
        }
        Ok(())
    }

    /// Final path of the file backing `id`
    pub fn path_for(&self, id: VideoId) -> PathBuf {
        self.config.dir.join(id.to_string())
    }

    /// Reserve a unique staging location for a download of `id`
    pub fn stage(&self, id: VideoId) -> StagedFile {
        let name = format!("{}.{}.part", id, Uuid::new_v4().simple());
        StagedFile {
            path: self.staging_dir.join(name),
            armed: true,
        }
    }

    pub async fn contains(&self, id: VideoId) -> bool {
        self.state.lock().await.position(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Cached ids, oldest first
    pub async fn snapshot(&self) -> Vec<VideoId> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .map(|entry| entry.id)
            .collect()
    }

    /// Open the cached file for `id`, if present
    pub async fn open(&self, id: VideoId) -> Result<Option<CachedVideo>> {
        let mut state = self.state.lock().await;
        let Some(pos) = state.position(id) else {
            return Ok(None);
        };

        let path = state.entries[pos].path.clone();
        match open_cached(id, &path).await {
            Ok(video) => Ok(Some(video)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Removed behind our back; treat as a miss rather than keep a phantom entry
                warn!(video_id = id, path = %path.display(), "Cached file vanished, dropping entry");
                state.entries.remove(pos);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Admit a fully downloaded file under `id`.
    ///
    /// Moves the staged file to its final path, appends the entry, then
    /// evicts from the head until the bound holds. Returns an open handle on
    /// the admitted file.
    ///
    /// If deleting an evicted file fails, the evicted entry is still gone
    /// from the index and the new entry stays admitted; the failure is
    /// returned as [`GatewayError::EvictionIo`].
    pub async fn admit(&self, id: VideoId, storage_key: &str, staged: StagedFile) -> Result<CachedVideo> {
        let mut state = self.state.lock().await;

        if let Some(pos) = state.position(id) {
            debug!(video_id = id, "Already cached, discarding duplicate download");
            drop(staged);
            let path = state.entries[pos].path.clone();
            return Ok(open_cached(id, &path).await?);
        }

        let final_path = self.path_for(id);
        fs::rename(staged.path(), &final_path).await?;
        staged.disarm();

        let inserted_at = state.next_ordinal;
        state.next_ordinal += 1;
        state.entries.push_back(CacheEntry {
            id,
            path: final_path.clone(),
            storage_key: storage_key.to_string(),
            inserted_at,
        });

        let mut eviction_error = None;
        while state.entries.len() > self.config.max_entries {
            let Some(evicted) = state.entries.pop_front() else {
                break;
            };
            match fs::remove_file(&evicted.path).await {
                Ok(()) => {
                    info!(
                        video_id = evicted.id,
                        inserted_at = evicted.inserted_at,
                        "Evicted cached video"
                    );
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(video_id = evicted.id, "Evicted video had no file on disk");
                }
                Err(e) => {
                    error!(
                        video_id = evicted.id,
                        path = %evicted.path.display(),
                        error = %e,
                        "Failed to delete evicted video; cache directory has drifted"
                    );
                    eviction_error = Some(GatewayError::EvictionIo {
                        video_id: evicted.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        debug!(
            video_id = id,
            inserted_at = inserted_at,
            entries = state.entries.len(),
            "Admitted video"
        );

        if let Some(err) = eviction_error {
            return Err(err);
        }

        Ok(open_cached(id, &final_path).await?)
    }
}

async fn open_cached(id: VideoId, path: &Path) -> std::io::Result<CachedVideo> {
    let file = File::open(path).await?;
    let len = file.metadata().await?.len();
    Ok(CachedVideo {
        id,
        path: path.to_path_buf(),
        file,
        len,
    })
}

// =============================================================================
// Tests
// =============================================================================
