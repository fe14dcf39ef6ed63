//! Per-host purge worker
//!
//! Each destination host gets one worker task that:
//! - Opens a single connection when it starts and keeps it until it stops
//! - Takes requests off the host's queue one at a time, in order
//! - Retries transient (non-200, non-404) responses up to [`MAX_ATTEMPTS`] times
//! - Discards a request immediately on a transport failure
//! - Stops cooperatively: between requests and between attempts

use parking_lot::Mutex;
use purger_client::{Connector, PurgeConnection, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::host::{HostKey, PurgeRequest};
use crate::queue::QueueReceiver;
use crate::stats::{HostCounters, ItemOutcome};

/// Maximum number of attempts for one request
pub const MAX_ATTEMPTS: u32 = 5;

/// Lifecycle of a worker. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Starting,
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Starting as u8))
    }

    fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Handle to a running worker
pub struct PurgeWorker {
    key: HostKey,
    state: Arc<StateCell>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PurgeWorker {
    /// Spawn the worker task for `key` on `runtime`
    pub(crate) fn spawn(
        key: HostKey,
        queue: QueueReceiver,
        connector: Arc<dyn Connector>,
        counters: Arc<HostCounters>,
        runtime: &Handle,
    ) -> Self {
        let state = Arc::new(StateCell::new());
        let cancel = CancellationToken::new();

        let task = WorkerTask {
            key: key.clone(),
            queue,
            connector,
            counters,
            cancel: cancel.clone(),
            state: state.clone(),
        };
        let handle = runtime.spawn(task.run());

        Self {
            key,
            state,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn key(&self) -> &HostKey {
        &self.key
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Ask the worker to stop. Does not interrupt a request in flight.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait up to `timeout` for the worker task to terminate.
    ///
    /// Returns `false` if it is still running when the timeout expires; the
    /// worker can then be joined again later.
    pub async fn join(&self, timeout: Duration) -> bool {
        let handle = self.handle.lock().take();
        let Some(mut handle) = handle else {
            return self.state() == WorkerState::Stopped;
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Purge worker for {} ended abnormally: {}", self.key, e);
                self.state.set(WorkerState::Stopped);
                true
            }
            Err(_) => {
                *self.handle.lock() = Some(handle);
                false
            }
        }
    }
}

impl std::fmt::Debug for PurgeWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurgeWorker")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// State owned by the spawned task
struct WorkerTask {
    key: HostKey,
    queue: QueueReceiver,
    connector: Arc<dyn Connector>,
    counters: Arc<HostCounters>,
    cancel: CancellationToken,
    state: Arc<StateCell>,
}

impl WorkerTask {
    async fn run(mut self) {
        debug!("Purge worker for {} starting", self.key);
        self.state.set(WorkerState::Running);

        let destination = self.key.to_string();
        let connection = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            connection = self.connector.connect(&destination) => Some(connection),
        };

        if let Some(connection) = connection {
            let connection = match connection {
                Ok(connection) => Some(connection),
                Err(e) => {
                    error!("Failed to open connection to {}: {}", self.key, e);
                    self.counters.record_error(e.to_string());
                    None
                }
            };

            info!("Purge worker for {} running", self.key);
            self.drain(connection.as_deref()).await;

            self.state.set(WorkerState::Stopping);
            debug!("Stopping purge worker for {}", self.key);
            drop(connection);
        } else {
            self.state.set(WorkerState::Stopping);
        }

        self.state.set(WorkerState::Stopped);
        debug!("Purge worker for {} terminated", self.key);
    }

    /// Process queued requests until stopped or the queue is closed
    async fn drain(&mut self, connection: Option<&dyn PurgeConnection>) {
        loop {
            let request = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                request = self.queue.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            self.counters.record_dequeued();

            let outcome = match connection {
                Some(connection) => self.process(connection, &request).await,
                None => {
                    error!(
                        "Failed to purge {}: no connection to {}",
                        request.url, self.key
                    );
                    ItemOutcome::Failed
                }
            };
            self.counters.record_outcome(outcome);
        }
    }

    /// Purge one request, retrying transient failures
    async fn process(&self, connection: &dyn PurgeConnection, request: &PurgeRequest) -> ItemOutcome {
        for attempt in 1..=MAX_ATTEMPTS {
            if self.cancel.is_cancelled() {
                debug!(
                    "Abandoning {} of {}: worker for {} is stopping",
                    request.verb, request.url, self.key
                );
                return ItemOutcome::Abandoned;
            }

            self.counters.record_attempt();
            match connection.purge(&request.url, &request.verb).await {
                Ok(response) if response.status == StatusCode::OK => {
                    debug!("Purged {} ({})", request.url, response.x_cache);
                    return ItemOutcome::Purged;
                }
                Ok(response) if response.status == StatusCode::NOT_FOUND => {
                    debug!("Purge URL not found: {}", request.url);
                    return ItemOutcome::NotFound;
                }
                Ok(response) => {
                    debug!(
                        "Transient failure on {} for {} ({}), attempt {}/{}",
                        request.verb, request.url, response.status, attempt, MAX_ATTEMPTS
                    );
                    if !response.x_error.is_empty() {
                        self.counters.record_error(response.x_error);
                    }
                }
                Err(e) => {
                    error!("Failed to purge {}: {}", request.url, e);
                    self.counters.record_error(e.to_string());
                    return ItemOutcome::Failed;
                }
            }
        }

        debug!(
            "Giving up on {} of {} after {} attempts",
            request.verb, request.url, MAX_ATTEMPTS
        );
        ItemOutcome::GaveUp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::HostQueue;
    use crate::testing::{Reply, ScriptedConnector, wait_until};

    fn spawn_worker(connector: Arc<ScriptedConnector>) -> (PurgeWorker, HostQueue, Arc<HostCounters>) {
        let (queue, receiver) = HostQueue::channel(0);
        let counters = Arc::new(HostCounters::default());
        let worker = PurgeWorker::spawn(
            HostKey::new("http", "cache"),
            receiver,
            connector,
            counters.clone(),
            &Handle::current(),
        );
        (worker, queue, counters)
    }

    fn push(queue: &HostQueue, counters: &HostCounters, url: &str) {
        counters.begin_enqueue();
        queue.try_push(PurgeRequest::new(url, "PURGE")).unwrap();
        counters.record_enqueued();
    }

    fn stats(counters: &HostCounters) -> crate::HostStats {
        counters.snapshot("http://cache".to_string(), WorkerState::Running)
    }

    #[tokio::test]
    async fn test_success_on_third_attempt() {
        let connector = Arc::new(ScriptedConnector::new(
            vec![Reply::Status(503), Reply::Status(500), Reply::Status(200)],
            Reply::Status(200),
        ));
        let (worker, queue, counters) = spawn_worker(connector.clone());

        push(&queue, &counters, "http://cache/a");
        wait_until(|| stats(&counters).purged == 1).await;

        assert_eq!(stats(&counters).attempts, 3);
        assert_eq!(connector.calls().len(), 3);

        worker.stop();
        assert!(worker.join(Duration::from_secs(5)).await);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let connector = Arc::new(ScriptedConnector::new(vec![], Reply::Status(500)));
        let (worker, queue, counters) = spawn_worker(connector.clone());

        push(&queue, &counters, "http://cache/a");
        wait_until(|| stats(&counters).gave_up == 1).await;

        assert_eq!(stats(&counters).attempts, MAX_ATTEMPTS as u64);
        assert_eq!(connector.calls().len(), MAX_ATTEMPTS as usize);

        worker.stop();
        assert!(worker.join(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_not_found_is_final() {
        let connector = Arc::new(ScriptedConnector::new(vec![Reply::Status(404)], Reply::Status(500)));
        let (worker, queue, counters) = spawn_worker(connector.clone());

        push(&queue, &counters, "http://cache/gone");
        wait_until(|| stats(&counters).not_found == 1).await;

        assert_eq!(stats(&counters).attempts, 1);

        worker.stop();
        assert!(worker.join(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_transport_failure_discards_without_retry() {
        let connector = Arc::new(ScriptedConnector::new(vec![Reply::Fail], Reply::Status(200)));
        let (worker, queue, counters) = spawn_worker(connector.clone());

        push(&queue, &counters, "http://cache/a");
        push(&queue, &counters, "http://cache/b");
        wait_until(|| stats(&counters).purged == 1).await;

        let stats = stats(&counters);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.attempts, 2);
        assert!(stats.last_error.is_some());
        assert_eq!(connector.calls(), vec!["http://cache/a", "http://cache/b"]);

        // The same connection serves both requests
        assert_eq!(connector.connect_count(), 1);

        worker.stop();
        assert!(worker.join(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_connect_failure_discards_each_request() {
        let connector = Arc::new(ScriptedConnector::new(vec![], Reply::Status(200)).failing_connect());
        let (worker, queue, counters) = spawn_worker(connector.clone());

        push(&queue, &counters, "http://cache/a");
        push(&queue, &counters, "http://cache/b");
        wait_until(|| stats(&counters).failed == 2).await;

        assert_eq!(stats(&counters).attempts, 0);
        assert!(connector.calls().is_empty());
        assert_eq!(worker.state(), WorkerState::Running);

        worker.stop();
        assert!(worker.join(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_stop_abandons_remaining_retries() {
        let connector = Arc::new(ScriptedConnector::new(vec![Reply::Gated(500)], Reply::Status(500)));
        let (worker, queue, counters) = spawn_worker(connector.clone());

        push(&queue, &counters, "http://cache/a");
        wait_until(|| connector.calls().len() == 1).await;

        // The first attempt is in flight; stop before it returns
        worker.stop();
        connector.release();

        assert!(worker.join(Duration::from_secs(5)).await);
        let stats = stats(&counters);
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_while_idle() {
        let connector = Arc::new(ScriptedConnector::new(vec![], Reply::Status(200)));
        let (worker, _queue, _counters) = spawn_worker(connector.clone());

        wait_until(|| worker.state() == WorkerState::Running && connector.connect_count() == 1).await;
        worker.stop();

        assert!(worker.is_stop_requested());
        assert!(worker.join(Duration::from_secs(5)).await);
        assert_eq!(worker.state(), WorkerState::Stopped);

        // Joining twice is harmless
        assert!(worker.join(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_closed_queue_stops_worker() {
        let connector = Arc::new(ScriptedConnector::new(vec![], Reply::Status(200)));
        let (worker, queue, _counters) = spawn_worker(connector);

        drop(queue);
        assert!(worker.join(Duration::from_secs(5)).await);
        assert_eq!(worker.state(), WorkerState::Stopped);
    }
}
