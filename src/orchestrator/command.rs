//! Orchestrator command loop
//!
//! Ingestion callbacks and worker lifecycle events both arrive here as
//! messages and are applied one at a time by a single task. Viewer
//! join/leave bypass the loop; they only touch the viewer count, under the
//! session's own lock.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::ingest::path::session_id_from_path;
use crate::ingest::IngestContext;
use crate::notify::{StreamEvent, Topic};
use crate::registry::{RegistryError, StreamSession};
use crate::session::{SessionInfo, SessionState};
use crate::worker::{TranscodeJob, WorkerEvent, WorkerEventKind};

use super::handle::Shared;

/// Message sent to the command loop
pub(crate) enum Command {
    Publish {
        ctx: IngestContext,
        path: String,
        reply: oneshot::Sender<Result<SessionInfo>>,
    },
    Unpublish {
        ctx: IngestContext,
        path: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

impl Command {
    /// Answer a command that arrived after shutdown
    fn reject(self) {
        match self {
            Command::Publish { reply, .. } => {
                let _ = reply.send(Err(Error::ShuttingDown));
            }
            Command::Unpublish { reply, .. } => {
                let _ = reply.send(Err(Error::ShuttingDown));
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

/// The serialization point for session lifecycle changes
pub(crate) struct CommandLoop {
    shared: Arc<Shared>,
    commands: mpsc::Receiver<Command>,
    worker_events: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl CommandLoop {
    pub(crate) fn new(
        shared: Arc<Shared>,
        commands: mpsc::Receiver<Command>,
        worker_events: mpsc::UnboundedReceiver<WorkerEvent>,
    ) -> Self {
        Self {
            shared,
            commands,
            worker_events,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!("Command loop started");

        let shutdown_reply = loop {
            tokio::select! {
                biased;

                Some(event) = self.worker_events.recv() => self.on_worker_event(event).await,

                command = self.commands.recv() => match command {
                    Some(Command::Publish { ctx, path, reply }) => {
                        let result = self.publish(ctx, path).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Unpublish { ctx, path, reply }) => {
                        let result = self.unpublish(ctx, path).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown { reply }) => break Some(reply),
                    // Every orchestrator handle was dropped
                    None => break None,
                },
            }
        };

        self.shutdown().await;

        self.commands.close();
        while let Some(command) = self.commands.recv().await {
            command.reject();
        }

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
        tracing::debug!("Command loop stopped");
    }

    async fn publish(&mut self, ctx: IngestContext, path: String) -> Result<SessionInfo> {
        let result = self.try_publish(&ctx, &path).await;

        if let Err(e) = &result {
            self.shared.stats.publish_rejected();
            tracing::warn!(
                connection = %ctx.connection_id,
                path = %path,
                error = %e,
                "Publish rejected"
            );
        }
        result
    }

    async fn try_publish(&mut self, ctx: &IngestContext, path: &str) -> Result<SessionInfo> {
        let shared = &self.shared;
        let id = session_id_from_path(path).ok_or_else(|| Error::InvalidPath(path.to_string()))?;

        match shared.registry.get(&id).await {
            Ok(existing) if existing.state.is_active() => return Err(Error::AlreadyExists(id)),
            Ok(existing) => {
                tracing::info!(
                    stream = %id,
                    state = %existing.state,
                    "Replacing finished session"
                );
                self.retire(&id).await?;
            }
            Err(RegistryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        if shared.artifacts.cancel_cleanup(&id) {
            tracing::debug!(stream = %id, "Pending artifact cleanup cancelled");
        }

        let output_dir = shared.artifacts.prepare(&id).await?;
        let job = TranscodeJob {
            session_id: id.clone(),
            input_url: shared.config.worker.input_url(path),
            output_dir,
        };

        let worker = match shared.workers.start(job) {
            Ok(worker) => worker,
            Err(e) => {
                self.schedule_cleanup(&id);
                return Err(e.into());
            }
        };

        let session = StreamSession::new(&id, &ctx.connection_id, path, worker);
        let info = match shared.registry.create(session).await {
            Ok(info) => info,
            Err(e) => {
                shared.workers.stop(&id);
                return Err(e.into());
            }
        };

        shared.stats.session_created();
        shared
            .hub
            .publish(&Topic::Global, StreamEvent::StreamCreated(info.summary()));

        tracing::info!(
            stream = %id,
            connection = %ctx.connection_id,
            worker_id = ?info.worker_id,
            "Publish started"
        );
        Ok(info)
    }

    async fn unpublish(&mut self, ctx: IngestContext, path: String) -> Result<()> {
        let shared = &self.shared;
        let id = session_id_from_path(&path).ok_or_else(|| Error::InvalidPath(path.clone()))?;

        let info = shared.registry.get(&id).await?;
        if info.connection_id != ctx.connection_id {
            tracing::warn!(
                stream = %id,
                connection = %ctx.connection_id,
                owner = %info.connection_id,
                "Ignoring publish stop from a connection that does not own the stream"
            );
            return Err(Error::Rejected(format!(
                "connection {} does not own stream {}",
                ctx.connection_id, id
            )));
        }

        shared.workers.stop(&id);

        if info.state.is_active() {
            match shared.registry.try_mutate(&id, |s| s.mark_ended()).await {
                Ok(info) => self.publish_lifecycle(&id, ended(&info)),
                Err(e) => tracing::warn!(stream = %id, error = %e, "Failed to end session"),
            }
        }

        self.retire(&id).await?;
        self.schedule_cleanup(&id);

        tracing::info!(stream = %id, connection = %ctx.connection_id, "Publish stopped");
        Ok(())
    }

    /// Remove a session and announce the removal
    async fn retire(&self, id: &str) -> Result<()> {
        let shared = &self.shared;
        shared.registry.remove(id).await?;
        shared.stats.session_removed();

        let removed = StreamEvent::StreamRemoved { id: id.to_string() };
        shared.hub.publish(&Topic::session(id), removed.clone());
        shared.hub.publish(&Topic::Global, removed);
        Ok(())
    }

    fn schedule_cleanup(&self, id: &str) {
        let shared = &self.shared;
        match shared.artifacts.schedule_cleanup(id, shared.config.cleanup_delay) {
            Ok(()) => shared.stats.cleanup_scheduled(),
            Err(e) => tracing::error!(stream = %id, error = %e, "Failed to schedule artifact cleanup"),
        }
    }

    async fn on_worker_event(&mut self, event: WorkerEvent) {
        let WorkerEvent {
            session_id: id,
            worker_id,
            kind,
        } = event;
        let registry = &self.shared.registry;

        let result = match kind {
            WorkerEventKind::Started { pid } => {
                tracing::debug!(stream = %id, worker_id = worker_id, pid = ?pid, "Worker started");
                registry
                    .try_mutate(&id, |s| {
                        s.ensure_worker(worker_id)?;
                        s.mark_streaming()
                    })
                    .await
                    .map(|info| StreamEvent::StreamStarted {
                        hls_url: self.shared.config.manifest_url(&info.id),
                        id: info.id,
                        name: info.display_name,
                    })
            }
            WorkerEventKind::Failed(reason) => {
                let result = registry
                    .try_mutate(&id, |s| {
                        s.ensure_worker(worker_id)?;
                        s.mark_failed(reason.clone())
                    })
                    .await;
                if result.is_ok() {
                    self.shared.stats.worker_failed();
                }
                result.map(|info| StreamEvent::StreamError {
                    id: info.id,
                    name: info.display_name,
                    error: reason,
                })
            }
            WorkerEventKind::Completed => registry
                .try_mutate(&id, |s| {
                    s.ensure_worker(worker_id)?;
                    s.mark_ended()
                })
                .await
                .map(|info| ended(&info)),
        };

        match result {
            Ok(event) => self.publish_lifecycle(&id, event),
            Err(RegistryError::NotFound(_)) | Err(RegistryError::StaleWorker { .. }) => {
                tracing::debug!(stream = %id, worker_id = worker_id, "Ignoring stale worker event");
            }
            Err(e) => {
                tracing::warn!(stream = %id, worker_id = worker_id, error = %e, "Worker event not applied");
            }
        }
    }

    /// Lifecycle events go to the session topic and are mirrored globally
    fn publish_lifecycle(&self, id: &str, event: StreamEvent) {
        tracing::debug!(stream = %id, event = event.name(), "Lifecycle event");
        self.shared.hub.publish(&Topic::session(id), event.clone());
        self.shared.hub.publish(&Topic::Global, event);
    }

    async fn shutdown(&mut self) {
        let shared = Arc::clone(&self.shared);
        let sessions = shared.registry.len().await;
        tracing::info!(sessions = sessions, "Orchestrator shutting down");

        let stopped = shared.workers.stop_all();

        for info in shared.registry.list_all().await {
            if !info.state.is_active() {
                continue;
            }
            if let Ok(info) = shared.registry.try_mutate(&info.id, |s| s.mark_ended()).await {
                self.publish_lifecycle(&info.id, ended(&info));
            }
        }

        let drained = shared.workers.drain(shared.config.shutdown_timeout).await;

        let mut purged = 0;
        if shared.config.purge_on_shutdown {
            purged = shared.artifacts.purge_pending().await;
            for info in shared.registry.list_all().await {
                match shared.artifacts.remove_now(&info.id).await {
                    Ok(()) => purged += 1,
                    Err(e) => tracing::warn!(stream = %info.id, error = %e, "Artifact purge failed"),
                }
            }
        }

        tracing::info!(
            workers_stopped = stopped,
            drained = drained,
            artifacts_purged = purged,
            "Orchestrator shut down"
        );
    }
}

fn ended(info: &SessionInfo) -> StreamEvent {
    debug_assert_eq!(info.state, SessionState::Ended);
    StreamEvent::StreamEnded {
        id: info.id.clone(),
        name: info.display_name.clone(),
    }
}
