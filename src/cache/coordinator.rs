//! Fetch Coordinator - one in-flight fetch per video id
//!
//! The first caller for an id registers a broadcast channel in the
//! in-flight map and runs its work. Later callers for the same id subscribe
//! to that channel and wait. When the first caller finishes (or its future
//! is dropped), the slot is removed and the waiters wake up and retry
//! registration; their own work starts by re-checking the cache, so in the
//! common case they find the video already admitted.
//!
//! Calls for different ids never touch each other's slots.

use std::future::Future;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::VideoId;

/// Serializes fetch work per video id
#[derive(Default)]
pub struct FetchCoordinator {
    /// In-flight fetches (id -> completion signal)
    in_flight: DashMap<VideoId, broadcast::Sender<()>>,
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` while holding the exclusive slot for `id`.
    ///
    /// Concurrent callers with the same id run one after another; the slot
    /// is released when `work` completes, fails, or is cancelled.
    pub async fn with_exclusive_fetch<T, F, Fut>(&self, id: VideoId, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _slot = self.acquire(id).await;
        work().await
    }

    async fn acquire(&self, id: VideoId) -> InFlightSlot<'_> {
        loop {
            let mut waiter = match self.in_flight.entry(id) {
                Entry::Occupied(slot) => slot.get().subscribe(),
                Entry::Vacant(slot) => {
                    let (sender, _) = broadcast::channel(1);
                    slot.insert(sender);
                    return InFlightSlot {
                        coordinator: self,
                        id,
                    };
                }
            };

            debug!(video_id = id, "Waiting on in-flight fetch");
            // Closed and Ok both mean the holder is done
            let _ = waiter.recv().await;
        }
    }

    /// Number of ids with a fetch in progress
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, id: VideoId) -> bool {
        self.in_flight.contains_key(&id)
    }
}

/// Held while a caller owns the fetch for one id
struct InFlightSlot<'a> {
    coordinator: &'a FetchCoordinator,
    id: VideoId,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        if let Some((_, sender)) = self.coordinator.in_flight.remove(&self.id) {
            let waiting = sender.receiver_count();
            debug!(video_id = self.id, waiting = waiting, "Released in-flight fetch");
            let _ = sender.send(());
        }
    }
}
