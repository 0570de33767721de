//! Video Gateway - caching front for Skynet-hosted videos
//!
//! Serves `GET /videos/{id}` from a bounded local cache. On a miss the
//! video's skylink is looked up in MongoDB, the object is downloaded from a
//! Skynet portal, admitted into the cache (evicting the oldest video when
//! full) and streamed to the client. Concurrent misses for the same id
//! share one download.
//!
//! ## Components
//!
//! - **Cache**: FIFO cache index and per-id fetch coordinator
//! - **Services**: metadata resolver, remote fetcher, request orchestrator
//! - **Server**: hyper HTTP/1 server and routes

pub mod cache;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatewayError, Result};
