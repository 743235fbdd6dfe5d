//! Orchestrator handle

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::artifacts::ArtifactStore;
use crate::error::{Error, Result};
use crate::ingest::IngestContext;
use crate::notify::{NotificationHub, Subscription, Topic, ViewerTracker};
use crate::registry::SessionRegistry;
use crate::session::SessionInfo;
use crate::stats::OrchestratorStats;
use crate::worker::WorkerController;

use super::command::{Command, CommandLoop};
use super::config::OrchestratorConfig;

/// Components shared between the handle and the command loop
pub(crate) struct Shared {
    pub(crate) config: OrchestratorConfig,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) hub: Arc<NotificationHub>,
    pub(crate) artifacts: ArtifactStore,
    pub(crate) workers: WorkerController,
    pub(crate) viewers: ViewerTracker,
    pub(crate) stats: OrchestratorStats,
}

/// Cloneable handle to a running orchestrator
///
/// Publish start/stop go through the command loop; queries and viewer
/// presence are served directly from the shared components.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) shared: Arc<Shared>,
    commands: mpsc::Sender<Command>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Orchestrator {
    /// Build the components and spawn the command loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: OrchestratorConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let hub = Arc::new(NotificationHub::with_capacity(config.event_capacity));
        let artifacts = ArtifactStore::new(&config.hls_root)
            .with_retry(config.cleanup_retries, config.cleanup_retry_interval);
        let (workers, worker_events) = WorkerController::new(config.worker.clone());
        let viewers = ViewerTracker::new(Arc::clone(&registry), Arc::clone(&hub));
        let (commands, command_rx) = mpsc::channel(config.command_capacity.max(1));

        tracing::info!(
            hls_root = %config.hls_root.display(),
            worker = %config.worker.program,
            cleanup_delay_ms = config.cleanup_delay.as_millis() as u64,
            "Orchestrator starting"
        );

        let shared = Arc::new(Shared {
            config,
            registry,
            hub,
            artifacts,
            workers,
            viewers,
            stats: OrchestratorStats::new(),
        });

        let task = tokio::spawn(CommandLoop::new(Arc::clone(&shared), command_rx, worker_events).run());

        Self {
            shared,
            commands,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// Get the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.shared.registry
    }

    /// Get the notification hub
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.shared.hub
    }

    /// Get the artifact store
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.shared.artifacts
    }

    /// Get the runtime counters
    pub fn stats(&self) -> &OrchestratorStats {
        &self.shared.stats
    }

    /// Start a session for a publish path
    ///
    /// Resolves once the session is registered and its worker spawned; the
    /// session is still `Starting` at that point.
    pub async fn publish(&self, ctx: IngestContext, path: impl Into<String>) -> Result<SessionInfo> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Publish {
            ctx,
            path: path.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::ShuttingDown)?
    }

    /// End and remove the session of a publish path
    pub async fn unpublish(&self, ctx: IngestContext, path: impl Into<String>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unpublish {
            ctx,
            path: path.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::ShuttingDown)?
    }

    /// Stop every worker, end every session and wait for the command loop
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }

        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Command loop panicked");
            }
        }
    }

    /// Join a session's topic as a viewer
    pub async fn join_viewer(&self, id: &str) -> (Subscription, Option<SessionInfo>) {
        self.shared.viewers.join(id).await
    }

    /// Leave a session's topic, returning the new viewer count
    pub async fn leave_viewer(&self, subscription: Subscription) -> Option<u32> {
        self.shared.viewers.leave(subscription).await
    }

    /// Subscribe to a topic without being counted as a viewer
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.shared.hub.subscribe(topic)
    }

    /// Drop a plain subscription
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.shared.hub.unsubscribe(subscription)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::ShuttingDown)
    }
}
