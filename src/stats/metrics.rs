//! Statistics for the orchestrator

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Orchestrator-wide counters
///
/// Updated with relaxed atomics; read through [`OrchestratorStats::snapshot`].
#[derive(Debug)]
pub struct OrchestratorStats {
    started_at: Instant,
    connections_open: AtomicU64,
    total_connections: AtomicU64,
    sessions_created: AtomicU64,
    sessions_removed: AtomicU64,
    publishes_rejected: AtomicU64,
    worker_failures: AtomicU64,
    cleanups_scheduled: AtomicU64,
}

impl OrchestratorStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connections_open: AtomicU64::new(0),
            total_connections: AtomicU64::new(0),
            sessions_created: AtomicU64::new(0),
            sessions_removed: AtomicU64::new(0),
            publishes_rejected: AtomicU64::new(0),
            worker_failures: AtomicU64::new(0),
            cleanups_scheduled: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_open.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Floor at zero: a close may be reported for a connection we never saw
        let _ = self
            .connections_open
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_removed(&self) {
        self.sessions_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_rejected(&self) {
        self.publishes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_failed(&self) {
        self.worker_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cleanup_scheduled(&self) {
        self.cleanups_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the orchestrator started
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Read all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            connections_open: self.connections_open.load(Ordering::Relaxed),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_removed: self.sessions_removed.load(Ordering::Relaxed),
            publishes_rejected: self.publishes_rejected.load(Ordering::Relaxed),
            worker_failures: self.worker_failures.load(Ordering::Relaxed),
            cleanups_scheduled: self.cleanups_scheduled.load(Ordering::Relaxed),
        }
    }
}

impl Default for OrchestratorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub connections_open: u64,
    pub total_connections: u64,
    pub sessions_created: u64,
    pub sessions_removed: u64,
    pub publishes_rejected: u64,
    pub worker_failures: u64,
    pub cleanups_scheduled: u64,
}
