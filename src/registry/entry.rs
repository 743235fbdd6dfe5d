//! Stream session entity
//!
//! The per-session record stored in the registry. Fields are private so that
//! the state machine and the worker-handle invariant can only change together.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::session::{SessionInfo, SessionState};
use crate::worker::WorkerHandle;

use super::error::RegistryError;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A live stream session
#[derive(Debug)]
pub struct StreamSession {
    id: String,
    /// Distinguishes this instance from earlier sessions with the same id
    generation: u64,
    display_name: String,
    state: SessionState,
    viewer_count: u32,
    started_at: DateTime<Utc>,
    /// Present iff `state` is Starting or Streaming
    worker: Option<WorkerHandle>,
    last_error: Option<String>,
    connection_id: String,
    publish_path: String,
}

impl StreamSession {
    /// Create a session in `Starting` with its worker attached
    pub fn new(
        id: impl Into<String>,
        connection_id: impl Into<String>,
        publish_path: impl Into<String>,
        worker: WorkerHandle,
    ) -> Self {
        let id = id.into();

        Self {
            display_name: id.clone(),
            id,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            state: SessionState::Starting,
            viewer_count: 0,
            started_at: Utc::now(),
            worker: Some(worker),
            last_error: None,
            connection_id: connection_id.into(),
            publish_path: publish_path.into(),
        }
    }

    /// Override the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn viewer_count(&self) -> u32 {
        self.viewer_count
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn worker(&self) -> Option<&WorkerHandle> {
        self.worker.as_ref()
    }

    /// Id of the attached worker
    pub fn worker_id(&self) -> Option<u64> {
        self.worker.as_ref().map(WorkerHandle::id)
    }

    /// Fail with `StaleWorker` unless `worker_id` is the attached worker
    pub fn ensure_worker(&self, worker_id: u64) -> Result<(), RegistryError> {
        if self.worker_id() == Some(worker_id) {
            Ok(())
        } else {
            Err(RegistryError::StaleWorker {
                id: self.id.clone(),
                worker_id,
            })
        }
    }

    /// Worker confirmed it started: `Starting → Streaming`
    pub fn mark_streaming(&mut self) -> Result<(), RegistryError> {
        self.transition(SessionState::Streaming)
    }

    /// Worker failed: `Starting|Streaming → Error`, detaching the worker
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), RegistryError> {
        self.transition(SessionState::Error)?;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// Worker completed or was stopped: `Starting|Streaming → Ended`
    pub fn mark_ended(&mut self) -> Result<(), RegistryError> {
        self.transition(SessionState::Ended)
    }

    /// Add a viewer, returning the new count
    pub fn add_viewer(&mut self) -> u32 {
        self.viewer_count = self.viewer_count.saturating_add(1);
        self.viewer_count
    }

    /// Remove a viewer (floored at zero), returning the new count
    pub fn remove_viewer(&mut self) -> u32 {
        self.viewer_count = self.viewer_count.saturating_sub(1);
        self.viewer_count
    }

    /// Take a point-in-time snapshot
    pub fn snapshot(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            generation: self.generation,
            display_name: self.display_name.clone(),
            state: self.state,
            viewer_count: self.viewer_count,
            started_at: self.started_at,
            last_error: self.last_error.clone(),
            connection_id: self.connection_id.clone(),
            publish_path: self.publish_path.clone(),
            worker_id: self.worker_id(),
        }
    }

    fn transition(&mut self, next: SessionState) -> Result<(), RegistryError> {
        if !self.state.can_transition_to(next) {
            return Err(RegistryError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to: next,
            });
        }

        tracing::debug!(stream = %self.id, from = %self.state, to = %next, "Session transition");
        self.state = next;
        if next.is_terminal() {
            self.worker = None;
        }
        Ok(())
    }
}
