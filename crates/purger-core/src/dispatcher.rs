//! Purge dispatcher
//!
//! The PurgeDispatcher is responsible for:
//! - Mapping each destination host to its own queue and worker, created on
//!   first use
//! - Synchronous purges, for callers that need the proxy's answer
//! - Asynchronous, fire-and-forget purges through the host queues
//! - Stopping every worker on shutdown

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use purger_client::{Connector, HttpConnector, ProxyError, PurgeResponse};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::PurgerConfig;
use crate::error::CoreError;
use crate::host::{HostKey, PurgeRequest};
use crate::queue::{EnqueueError, HostQueue};
use crate::stats::{HostCounters, HostStats};
use crate::worker::PurgeWorker;

/// Status of a synchronous purge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeStatus {
    /// HTTP status code returned by the proxy
    Code(u16),
    /// The request failed before a response was received
    Error,
}

impl fmt::Display for PurgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurgeStatus::Code(code) => write!(f, "{}", code),
            PurgeStatus::Error => write!(f, "ERROR"),
        }
    }
}

impl Serialize for PurgeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PurgeStatus::Code(code) => serializer.serialize_u16(*code),
            PurgeStatus::Error => serializer.serialize_str("ERROR"),
        }
    }
}

/// Result of a synchronous purge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeOutcome {
    pub status: PurgeStatus,
    /// Cache status header returned by the proxy
    pub x_cache: String,
    /// Proxy error header, or the failure description when `status` is `Error`
    pub x_error: String,
}

impl From<PurgeResponse> for PurgeOutcome {
    fn from(response: PurgeResponse) -> Self {
        Self {
            status: PurgeStatus::Code(response.status.as_u16()),
            x_cache: response.x_cache,
            x_error: response.x_error,
        }
    }
}

/// The queue and worker serving one destination host
pub struct HostEntry {
    key: HostKey,
    queue: HostQueue,
    worker: PurgeWorker,
    counters: Arc<HostCounters>,
}

impl HostEntry {
    pub fn key(&self) -> &HostKey {
        &self.key
    }

    pub fn queue(&self) -> &HostQueue {
        &self.queue
    }

    pub fn worker(&self) -> &PurgeWorker {
        &self.worker
    }

    pub fn stats(&self) -> HostStats {
        self.counters
            .snapshot(self.key.to_string(), self.worker.state())
    }
}

/// Dispatches purge requests to caching proxies
pub struct PurgeDispatcher {
    config: PurgerConfig,
    connector: Arc<dyn Connector>,
    /// Map of destination host to its queue and worker
    hosts: DashMap<HostKey, Arc<HostEntry>>,
    /// Runtime the workers are spawned on
    runtime: Handle,
}

impl PurgeDispatcher {
    /// Create a dispatcher using `connector` for every connection.
    ///
    /// Must be called from within a tokio runtime; workers are spawned on
    /// that runtime even when purges are queued from other threads.
    pub fn new(config: PurgerConfig, connector: Arc<dyn Connector>) -> Result<Self, CoreError> {
        let runtime = Handle::try_current().map_err(|e| CoreError::Runtime(e.to_string()))?;

        info!(
            "Initializing purge dispatcher (backlog: {}, verb: {}, timeout: {}s/{}s)",
            if config.backlog == 0 {
                "unbounded".to_string()
            } else {
                config.backlog.to_string()
            },
            config.http_verb,
            config.timeout.connect_secs,
            config.timeout.read_secs
        );

        Ok(Self {
            config,
            connector,
            hosts: DashMap::new(),
            runtime,
        })
    }

    /// Create a dispatcher that purges over HTTP
    pub fn with_http(config: PurgerConfig) -> Result<Self, CoreError> {
        let connector = HttpConnector::new(config.client_config());
        Self::new(config, Arc::new(connector))
    }

    pub fn config(&self) -> &PurgerConfig {
        &self.config
    }

    /// HTTP method used when callers do not choose one
    pub fn default_verb(&self) -> &str {
        &self.config.http_verb
    }

    /// Purge `url` right away and report the proxy's answer.
    ///
    /// Opens a short-lived connection and makes exactly one attempt. Failures
    /// never propagate: they are reported as [`PurgeStatus::Error`] with the
    /// failure description in `x_error`.
    pub async fn purge_sync(&self, url: &str, verb: &str) -> PurgeOutcome {
        let outcome = match self.purge_once(url, verb).await {
            Ok(response) => PurgeOutcome::from(response),
            Err(e) => PurgeOutcome {
                status: PurgeStatus::Error,
                x_cache: String::new(),
                x_error: describe_error(&e),
            },
        };

        debug!("Finished {} for {}: {} {}", verb, url, outcome.status, outcome.x_cache);
        if !outcome.x_error.is_empty() {
            debug!("Error while purging {}:\n{}", url, outcome.x_error);
        }
        debug!("Completed synchronous purge of {}", url);

        outcome
    }

    async fn purge_once(&self, url: &str, verb: &str) -> Result<PurgeResponse, ProxyError> {
        let connection = self.connector.connect(url).await?;
        connection.purge(url, verb).await
    }

    /// Queue `url` for purging by its host's worker.
    ///
    /// Never blocks. When the host's queue is full the request is dropped,
    /// with a warning unless `quiet_queue_full` is set.
    pub fn purge_async(&self, url: &str, verb: &str) {
        let entry = match self.get_queue_and_worker(url) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot queue purge of {}: {}", url, e);
                return;
            }
        };

        entry.counters.begin_enqueue();
        match entry.queue.try_push(PurgeRequest::new(url, verb)) {
            Ok(()) => {
                entry.counters.record_enqueued();
                debug!("Queued {}", url);
            }
            Err(EnqueueError::Full(_)) => {
                entry.counters.record_dropped();
                if !self.config.quiet_queue_full {
                    warn!(
                        "The purge queue for the URL {} is full - the request will be \
                         discarded. Please check the server is reachable, or disable \
                         this purge host",
                        url
                    );
                }
            }
            Err(EnqueueError::Closed(_)) => {
                entry.counters.record_dropped();
                debug!(
                    "Purge worker for {} has stopped, discarding {}",
                    entry.key, url
                );
            }
        }
    }

    /// Get the queue and worker for the host of `url`, creating both on
    /// first use. Concurrent callers always end up with the same entry.
    pub fn get_queue_and_worker(&self, url: &str) -> Result<Arc<HostEntry>, CoreError> {
        let key = HostKey::from_url(url)?;

        if let Some(entry) = self.hosts.get(&key) {
            return Ok(entry.value().clone());
        }

        match self.hosts.entry(key) {
            // Another caller created it first
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let key = entry.key().clone();
                debug!("Creating purge worker for {}", key);
                let host = Arc::new(self.spawn_host(key));
                Ok(entry.insert(host).value().clone())
            }
        }
    }

    fn spawn_host(&self, key: HostKey) -> HostEntry {
        let (queue, receiver) = HostQueue::channel(self.config.backlog);
        let counters = Arc::new(HostCounters::default());
        let worker = PurgeWorker::spawn(
            key.clone(),
            receiver,
            self.connector.clone(),
            counters.clone(),
            &self.runtime,
        );

        HostEntry {
            key,
            queue,
            worker,
            counters,
        }
    }

    /// Stop every worker.
    ///
    /// With `wait`, each worker is given the configured stop timeout to
    /// terminate; returns `false` if any of them does not. Requests still
    /// queued are abandoned.
    pub async fn stop(&self, wait: bool) -> bool {
        let entries: Vec<Arc<HostEntry>> =
            self.hosts.iter().map(|entry| entry.value().clone()).collect();

        for entry in &entries {
            entry.worker.stop();
        }

        if !wait {
            return true;
        }

        let timeout = self.config.stop_timeout();
        for entry in &entries {
            if !entry.worker.join(timeout).await {
                warn!("Purge worker for {} failed to terminate", entry.key);
                return false;
            }
        }

        info!("Stopped {} purge workers", entries.len());
        true
    }

    /// Number of hosts with a queue and worker
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Statistics for every host, ordered by host
    pub fn host_stats(&self) -> Vec<HostStats> {
        let mut stats: Vec<HostStats> =
            self.hosts.iter().map(|entry| entry.value().stats()).collect();
        stats.sort_by(|a, b| a.host.cmp(&b.host));
        stats
    }
}

impl fmt::Debug for PurgeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PurgeDispatcher")
            .field("config", &self.config)
            .field("hosts", &self.hosts.len())
            .finish_non_exhaustive()
    }
}

/// Error message including its chain of causes, one per line
fn describe_error(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str("\ncaused by: ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
