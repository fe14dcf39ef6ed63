//! Cache Purger Core
//!
//! This crate provides the purge dispatcher: one bounded queue and one
//! worker per caching-proxy host, bounded retry of transient failures, and
//! coordinated shutdown. It also turns changed paths into purge URLs,
//! including virtual-host rewriting.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod paths;
pub mod queue;
pub mod rewrite;
pub mod settings;
pub mod stats;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{PurgerConfig, TimeoutConfig};
pub use dispatcher::{HostEntry, PurgeDispatcher, PurgeOutcome, PurgeStatus};
pub use error::CoreError;
pub use host::{HostKey, PurgeRequest};
pub use paths::{PathRewriter, PurgePaths, StaticPaths, paths_to_purge, queue_purges, urls_to_purge};
pub use queue::{EnqueueError, HostQueue};
pub use rewrite::{VirtualHostContext, VirtualHostRewriter};
pub use settings::{
    CachePurgingSettings, InMemorySettingsProvider, SettingsProvider, is_cache_purging_enabled,
};
pub use stats::{HostStats, ItemOutcome};
pub use worker::{MAX_ATTEMPTS, PurgeWorker, WorkerState};
