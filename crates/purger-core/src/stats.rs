//! Per-host purge statistics

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::worker::WorkerState;

/// How a worker finished with one queued request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The proxy answered 200
    Purged,
    /// The proxy answered 404; nothing was cached
    NotFound,
    /// Transport failure; discarded without retry
    Failed,
    /// Every attempt returned a transient status
    GaveUp,
    /// The worker was stopped before the request completed
    Abandoned,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Purged => "purged",
            ItemOutcome::NotFound => "not_found",
            ItemOutcome::Failed => "failed",
            ItemOutcome::GaveUp => "gave_up",
            ItemOutcome::Abandoned => "abandoned",
        }
    }
}

/// Live counters shared between the dispatcher and a host's worker
#[derive(Debug, Default)]
pub(crate) struct HostCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    attempts: AtomicU64,
    purged: AtomicU64,
    not_found: AtomicU64,
    failed: AtomicU64,
    gave_up: AtomicU64,
    abandoned: AtomicU64,
    pending: AtomicUsize,
    last_success: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
}

impl HostCounters {
    /// Reserve a pending slot before pushing onto the queue
    pub(crate) fn begin_enqueue(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cache_purger_enqueued_total").increment(1);
    }

    /// The push failed: release the slot taken by `begin_enqueue`
    pub(crate) fn record_dropped(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cache_purger_dropped_total").increment(1);
    }

    pub(crate) fn record_dequeued(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self, error: String) {
        *self.last_error.lock() = Some(error);
    }

    pub(crate) fn record_outcome(&self, outcome: ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Purged => &self.purged,
            ItemOutcome::NotFound => &self.not_found,
            ItemOutcome::Failed => &self.failed,
            ItemOutcome::GaveUp => &self.gave_up,
            ItemOutcome::Abandoned => &self.abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if matches!(outcome, ItemOutcome::Purged | ItemOutcome::NotFound) {
            *self.last_success.lock() = Some(Utc::now());
        }

        metrics::counter!("cache_purger_purges_total", "outcome" => outcome.as_str()).increment(1);
    }

    pub(crate) fn snapshot(&self, host: String, state: WorkerState) -> HostStats {
        HostStats {
            host,
            state,
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::SeqCst),
            attempts: self.attempts.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            gave_up: self.gave_up.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            last_success: *self.last_success.lock(),
            last_error: self.last_error.lock().clone(),
        }
    }
}

/// Point-in-time statistics for one destination host
#[derive(Debug, Clone, Serialize)]
pub struct HostStats {
    pub host: String,
    pub state: WorkerState,
    pub enqueued: u64,
    pub dropped: u64,
    pub pending: usize,
    pub attempts: u64,
    pub purged: u64,
    pub not_found: u64,
    pub failed: u64,
    pub gave_up: u64,
    pub abandoned: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
