//! HTTP server

pub mod http;

pub use http::{route, run, AppState, ResponseBody};
