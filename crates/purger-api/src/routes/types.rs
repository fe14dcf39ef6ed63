//! Request/Response DTOs for the purge API

use purger_core::VirtualHostContext;
use serde::{Deserialize, Serialize};

/// Purge a single URL
#[derive(Deserialize)]
pub struct PurgeUrlRequest {
    pub url: String,
    /// Defaults to the configured HTTP verb
    pub verb: Option<String>,
    /// Wait for the proxy's answer instead of queueing
    #[serde(default)]
    pub sync: bool,
}

/// Accepted asynchronous purge
#[derive(Serialize)]
pub struct QueuedResponse {
    pub queued: String,
}

/// Purge paths on every configured caching proxy
#[derive(Deserialize)]
pub struct PurgePathsRequest {
    #[serde(default)]
    pub relative_paths: Vec<String>,
    #[serde(default)]
    pub absolute_paths: Vec<String>,
    pub verb: Option<String>,
    /// Virtual-hosting details; relative paths are rewritten when present
    pub virtual_host: Option<VirtualHostContext>,
}

#[derive(Serialize)]
pub struct PurgePathsResponse {
    pub urls: Vec<String>,
}

#[derive(Serialize)]
pub struct HostsResponse {
    pub count: usize,
    pub hosts: Vec<purger_core::HostStats>,
}
