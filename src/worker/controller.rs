//! Worker controller
//!
//! Launches one transcoding process per session and watches it from a
//! monitor task. The monitor turns process lifecycle into [`WorkerEvent`]s on
//! an unbounded channel; the controller never touches session state itself.

use std::collections::{HashMap, VecDeque};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::mpsc;

use super::config::WorkerConfig;
use super::error::WorkerError;
use super::handle::{TranscodeJob, WorkerEvent, WorkerEventKind, WorkerHandle};

/// How long to keep reading stderr after the process exited
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Default)]
struct Workers {
    /// Workers that have not been asked to stop, by session id
    by_session: HashMap<String, WorkerHandle>,
    /// Every worker whose process has not exited yet, by worker id
    live: HashMap<u64, WorkerHandle>,
}

/// Starts, stops and monitors transcoding workers
pub struct WorkerController {
    config: WorkerConfig,
    events: mpsc::UnboundedSender<WorkerEvent>,
    next_worker_id: AtomicU64,
    workers: Arc<Mutex<Workers>>,
}

impl WorkerController {
    /// Create a controller.
    ///
    /// Returns the controller and the receiver for worker lifecycle events.
    pub fn new(config: WorkerConfig) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let controller = Self {
            config,
            events: tx,
            next_worker_id: AtomicU64::new(1),
            workers: Arc::new(Mutex::new(Workers::default())),
        };

        (controller, rx)
    }

    /// Get the worker configuration
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Launch a worker for a session.
    ///
    /// Returns once the process is spawned; the `Started` event follows
    /// asynchronously. Fails if the session already has a worker that was
    /// not stopped.
    pub fn start(&self, job: TranscodeJob) -> Result<WorkerHandle, WorkerError> {
        let mut workers = lock(&self.workers);

        if workers.by_session.contains_key(&job.session_id) {
            return Err(WorkerError::AlreadyRunning(job.session_id));
        }

        let args = self.config.render_args(&job.input_url, &job.output_dir);
        let child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WorkerError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let handle = WorkerHandle::new(worker_id, child.id());

        tracing::info!(
            stream = %job.session_id,
            worker_id = worker_id,
            pid = ?handle.pid(),
            input = %job.input_url,
            output = %job.output_dir.display(),
            "Worker spawned"
        );

        workers
            .by_session
            .insert(job.session_id.clone(), handle.clone());
        workers.live.insert(worker_id, handle.clone());
        drop(workers);

        let monitor = Monitor {
            session_id: job.session_id,
            handle: handle.clone(),
            events: self.events.clone(),
            workers: Arc::clone(&self.workers),
            tail: StderrTail::new(self.config.stderr_tail_lines),
        };
        tokio::spawn(monitor.run(child));

        Ok(handle)
    }

    /// Signal the session's worker to terminate.
    ///
    /// Does not wait for the process to exit. Returns `false` when there is
    /// no worker to stop, which is not an error.
    pub fn stop(&self, session_id: &str) -> bool {
        let handle = lock(&self.workers).by_session.remove(session_id);

        match handle {
            Some(handle) => {
                let requested = handle.request_stop();
                tracing::debug!(
                    stream = %session_id,
                    worker_id = handle.id(),
                    requested = requested,
                    "Worker stop requested"
                );
                requested
            }
            None => false,
        }
    }

    /// Whether the session has a worker that was not asked to stop
    pub fn is_running(&self, session_id: &str) -> bool {
        lock(&self.workers).by_session.contains_key(session_id)
    }

    /// Number of worker processes that have not exited
    pub fn live_count(&self) -> usize {
        lock(&self.workers).live.len()
    }

    /// Signal every worker to terminate
    pub fn stop_all(&self) -> usize {
        let handles: Vec<WorkerHandle> = lock(&self.workers)
            .by_session
            .drain()
            .map(|(_, handle)| handle)
            .collect();

        handles.iter().filter(|h| h.request_stop()).count()
    }

    /// Wait for every live worker to exit, up to `timeout`.
    ///
    /// Returns `true` if all workers exited in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let handles: Vec<WorkerHandle> = lock(&self.workers).live.values().cloned().collect();

        if handles.is_empty() {
            return true;
        }

        let exits = futures::future::join_all(handles.iter().map(|h| h.exited()));
        match tokio::time::timeout(timeout, exits).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.live_count(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Workers still running after drain timeout"
                );
                false
            }
        }
    }
}

fn lock(workers: &Mutex<Workers>) -> MutexGuard<'_, Workers> {
    workers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded tail of a worker's stderr output
struct StderrTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl StderrTail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, line: String) {
        if line.trim().is_empty() {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Last non-empty line, used as the failure reason
    fn last(&self) -> Option<String> {
        self.lines.back().map(|line| line.trim().to_string())
    }
}

struct Monitor {
    session_id: String,
    handle: WorkerHandle,
    events: mpsc::UnboundedSender<WorkerEvent>,
    workers: Arc<Mutex<Workers>>,
    tail: StderrTail,
}

impl Monitor {
    async fn run(mut self, mut child: Child) {
        let worker_id = self.handle.id();

        self.handle.mark_running();
        self.emit(WorkerEventKind::Started {
            pid: self.handle.pid(),
        });

        let mut stderr = child.stderr.take().map(|s| BufReader::new(s).lines());
        let mut stop_requested = false;

        let status = loop {
            tokio::select! {
                line = next_line(&mut stderr) => match line {
                    Ok(Some(line)) => {
                        tracing::trace!(stream = %self.session_id, worker_id = worker_id, "{}", line);
                        self.tail.push(line);
                    }
                    _ => stderr = None,
                },
                _ = self.handle.stop_requested(), if !stop_requested => {
                    stop_requested = true;
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(
                            stream = %self.session_id,
                            worker_id = worker_id,
                            error = %e,
                            "Failed to signal worker"
                        );
                    }
                }
                status = child.wait() => break status,
            }
        };

        if let Some(lines) = stderr.as_mut() {
            let tail = &mut self.tail;
            let _ = tokio::time::timeout(STDERR_DRAIN_TIMEOUT, async {
                while let Ok(Some(line)) = lines.next_line().await {
                    tail.push(line);
                }
            })
            .await;
        }

        self.handle.mark_exited();
        self.forget();

        let kind = self.outcome(status, stop_requested);
        match &kind {
            WorkerEventKind::Failed(reason) => tracing::warn!(
                stream = %self.session_id,
                worker_id = worker_id,
                reason = %reason,
                "Worker failed"
            ),
            _ => tracing::info!(
                stream = %self.session_id,
                worker_id = worker_id,
                stopped = stop_requested,
                "Worker exited"
            ),
        }
        self.emit(kind);
    }

    fn outcome(&self, status: std::io::Result<ExitStatus>, stop_requested: bool) -> WorkerEventKind {
        match status {
            Ok(_) if stop_requested => WorkerEventKind::Completed,
            Ok(status) if status.success() => WorkerEventKind::Completed,
            Ok(status) => WorkerEventKind::Failed(
                self.tail
                    .last()
                    .unwrap_or_else(|| format!("worker exited with {}", status)),
            ),
            Err(e) => WorkerEventKind::Failed(format!("failed to wait for worker: {}", e)),
        }
    }

    fn forget(&self) {
        let mut workers = lock(&self.workers);
        let worker_id = self.handle.id();

        workers.live.remove(&worker_id);
        if workers
            .by_session
            .get(&self.session_id)
            .is_some_and(|h| h.id() == worker_id)
        {
            workers.by_session.remove(&self.session_id);
        }
    }

    fn emit(&self, kind: WorkerEventKind) {
        let event = WorkerEvent::new(self.session_id.clone(), self.handle.id(), kind);
        if self.events.send(event).is_err() {
            tracing::debug!(stream = %self.session_id, "Worker event receiver dropped");
        }
    }
}

async fn next_line(
    lines: &mut Option<Lines<BufReader<ChildStderr>>>,
) -> std::io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::worker::WorkerPhase;

    fn job(id: &str) -> TranscodeJob {
        TranscodeJob {
            session_id: id.to_string(),
            input_url: format!("rtmp://127.0.0.1:1935/live/{}", id),
            output_dir: std::env::temp_dir(),
        }
    }

    fn shell(script: &str) -> WorkerConfig {
        WorkerConfig::default().program("sh").args(["-c", script])
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> WorkerEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for worker event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_started_then_completed() {
        let (controller, mut rx) = WorkerController::new(shell("exit 0"));
        let handle = controller.start(job("alpha")).unwrap();

        let started = next_event(&mut rx).await;
        assert_eq!(started.session_id, "alpha");
        assert_eq!(started.worker_id, handle.id());
        assert!(matches!(started.kind, WorkerEventKind::Started { .. }));

        let done = next_event(&mut rx).await;
        assert_eq!(done.kind, WorkerEventKind::Completed);
        assert_eq!(handle.phase(), WorkerPhase::Exited);
        assert!(!controller.is_running("alpha"));
        assert_eq!(controller.live_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_reports_last_stderr_line() {
        let (controller, mut rx) =
            WorkerController::new(shell("echo 'starting up' >&2; echo 'decode error' >&2; exit 1"));
        controller.start(job("alpha")).unwrap();

        next_event(&mut rx).await;
        let failed = next_event(&mut rx).await;
        assert_eq!(failed.kind, WorkerEventKind::Failed("decode error".into()));
    }

    #[tokio::test]
    async fn test_failure_without_stderr() {
        let (controller, mut rx) = WorkerController::new(shell("exit 3"));
        controller.start(job("alpha")).unwrap();

        next_event(&mut rx).await;
        match next_event(&mut rx).await.kind {
            WorkerEventKind::Failed(reason) => assert!(reason.starts_with("worker exited with")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (controller, _rx) = WorkerController::new(shell("sleep 30"));
        controller.start(job("alpha")).unwrap();

        let result = controller.start(job("alpha"));
        assert!(matches!(result, Err(WorkerError::AlreadyRunning(ref id)) if id == "alpha"));

        // Other sessions are unaffected
        assert!(controller.start(job("beta")).is_ok());

        controller.stop_all();
        assert!(controller.drain(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_reports_completed() {
        let (controller, mut rx) = WorkerController::new(shell("sleep 30"));
        let handle = controller.start(job("alpha")).unwrap();
        next_event(&mut rx).await;

        assert!(controller.stop("alpha"));
        assert!(!controller.stop("alpha"));
        assert!(!controller.stop("missing"));

        let done = next_event(&mut rx).await;
        assert_eq!(done.kind, WorkerEventKind::Completed);
        handle.exited().await;
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (controller, _rx) = WorkerController::new(shell("sleep 30"));
        let first = controller.start(job("alpha")).unwrap();

        controller.stop("alpha");
        let second = controller.start(job("alpha")).unwrap();
        assert_ne!(first.id(), second.id());

        controller.stop_all();
        assert!(controller.drain(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let config = WorkerConfig::default().program("nonexistent_transcoder_12345");
        let (controller, _rx) = WorkerController::new(config);

        let result = controller.start(job("alpha"));
        assert!(matches!(result, Err(WorkerError::Spawn { .. })));
        assert!(!controller.is_running("alpha"));
    }
}
