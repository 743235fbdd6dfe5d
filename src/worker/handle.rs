//! Worker handle, lifecycle phases and events
//!
//! The worker lifecycle is tracked separately from the session state: the
//! handle follows the process (`Spawned → Running → Stopping → Exited`),
//! while the events it emits drive the session's own state machine.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Notify};

/// Lifecycle phase of a worker process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Process spawned, monitor not yet running
    Spawned,
    /// Monitor observed the process and emitted its start signal
    Running,
    /// Termination requested, waiting for exit
    Stopping,
    /// Process has exited
    Exited,
}

/// What a worker should transcode
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Session the worker belongs to
    pub session_id: String,
    /// Ingestion read endpoint
    pub input_url: String,
    /// Session artifact directory
    pub output_dir: PathBuf,
}

/// Lifecycle signal from a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEventKind {
    /// Worker is up and producing output
    Started { pid: Option<u32> },
    /// Worker exited abnormally
    Failed(String),
    /// Worker finished normally or was stopped
    Completed,
}

/// Event emitted by a worker monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEvent {
    pub session_id: String,
    pub worker_id: u64,
    pub kind: WorkerEventKind,
}

impl WorkerEvent {
    pub fn new(session_id: impl Into<String>, worker_id: u64, kind: WorkerEventKind) -> Self {
        Self {
            session_id: session_id.into(),
            worker_id,
            kind,
        }
    }
}

/// Cheap, cloneable reference to a running worker
///
/// Dropping a handle does not stop the worker; call [`WorkerHandle::request_stop`].
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: u64,
    pid: Option<u32>,
    stop: Arc<Notify>,
    phase: Arc<watch::Sender<WorkerPhase>>,
}

impl WorkerHandle {
    pub(crate) fn new(id: u64, pid: Option<u32>) -> Self {
        let (phase, _) = watch::channel(WorkerPhase::Spawned);

        Self {
            id,
            pid,
            stop: Arc::new(Notify::new()),
            phase: Arc::new(phase),
        }
    }

    /// Controller-assigned worker id, unique per process launch
    pub fn id(&self) -> u64 {
        self.id
    }

    /// OS process id, if known
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> WorkerPhase {
        *self.phase.borrow()
    }

    /// Ask the worker to terminate without waiting for it
    ///
    /// Returns `false` if a stop was already requested or the worker has exited.
    pub fn request_stop(&self) -> bool {
        let requested = self.phase.send_if_modified(|phase| match phase {
            WorkerPhase::Spawned | WorkerPhase::Running => {
                *phase = WorkerPhase::Stopping;
                true
            }
            WorkerPhase::Stopping | WorkerPhase::Exited => false,
        });

        if requested {
            self.stop.notify_one();
        }
        requested
    }

    /// Wait until the process has exited
    pub async fn exited(&self) {
        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|phase| *phase == WorkerPhase::Exited).await;
    }

    pub(super) async fn stop_requested(&self) {
        self.stop.notified().await
    }

    pub(super) fn mark_running(&self) {
        self.phase.send_if_modified(|phase| {
            if *phase == WorkerPhase::Spawned {
                *phase = WorkerPhase::Running;
                true
            } else {
                false
            }
        });
    }

    pub(super) fn mark_exited(&self) {
        self.phase.send_replace(WorkerPhase::Exited);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_progression() {
        let handle = WorkerHandle::new(1, Some(42));
        assert_eq!(handle.phase(), WorkerPhase::Spawned);

        handle.mark_running();
        assert_eq!(handle.phase(), WorkerPhase::Running);

        assert!(handle.request_stop());
        assert_eq!(handle.phase(), WorkerPhase::Stopping);

        // Stopping never goes back to Running
        handle.mark_running();
        assert_eq!(handle.phase(), WorkerPhase::Stopping);
    }

    #[test]
    fn test_request_stop_is_idempotent() {
        let handle = WorkerHandle::new(1, None);
        let clone = handle.clone();

        assert!(handle.request_stop());
        assert!(!clone.request_stop());

        handle.mark_exited();
        assert!(!handle.request_stop());
    }

    #[tokio::test]
    async fn test_stop_notification_is_not_lost() {
        let handle = WorkerHandle::new(7, None);
        handle.request_stop();

        // The permit is stored even though nobody was waiting yet
        tokio::time::timeout(std::time::Duration::from_secs(1), handle.stop_requested())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exited_resolves() {
        let handle = WorkerHandle::new(3, None);
        let waiter = handle.clone();

        let task = tokio::spawn(async move { waiter.exited().await });
        handle.mark_exited();

        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
