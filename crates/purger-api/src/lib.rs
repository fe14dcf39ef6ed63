//! Cache Purger REST API
//!
//! This crate provides the Axum-based HTTP API for the cache purger:
//! health checks, synchronous and queued purges, path-based purges and
//! per-host worker statistics.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
