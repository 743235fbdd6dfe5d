//! Session registry implementation
//!
//! The single owner of every active [`StreamSession`], keyed by session id.

use std::collections::HashMap;

use tokio::sync::{Mutex, RwLock};

use crate::session::SessionInfo;

use super::entry::StreamSession;
use super::error::RegistryError;

/// Concurrency-safe store of stream sessions
///
/// The outer `RwLock` guards membership; each session has its own `Mutex`.
/// Mutations hold the outer read lock for their whole duration, so `remove`
/// (which needs the write lock) can never interleave with a half-applied
/// mutation of the session it removes.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Mutex<StreamSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new session
    ///
    /// Fails with `AlreadyExists` if the id is taken.
    pub async fn create(&self, session: StreamSession) -> Result<SessionInfo, RegistryError> {
        let mut sessions = self.sessions.write().await;
        let id = session.id().to_string();

        if sessions.contains_key(&id) {
            return Err(RegistryError::AlreadyExists(id));
        }

        let info = session.snapshot();
        sessions.insert(id, Mutex::new(session));

        tracing::info!(
            stream = %info.id,
            worker_id = ?info.worker_id,
            sessions = sessions.len(),
            "Session registered"
        );

        Ok(info)
    }

    /// Snapshot of one session
    pub async fn get(&self, id: &str) -> Result<SessionInfo, RegistryError> {
        let sessions = self.sessions.read().await;

        let entry = sessions
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let session = entry.lock().await;
        Ok(session.snapshot())
    }

    /// Remove a session, returning the entity
    pub async fn remove(&self, id: &str) -> Result<StreamSession, RegistryError> {
        let mut sessions = self.sessions.write().await;

        let session = sessions
            .remove(id)
            .map(Mutex::into_inner)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        tracing::info!(
            stream = %id,
            state = %session.state(),
            viewers = session.viewer_count(),
            sessions = sessions.len(),
            "Session removed"
        );

        Ok(session)
    }

    /// Point-in-time snapshot of all sessions, ordered by start time
    pub async fn list_all(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut snapshot = Vec::with_capacity(sessions.len());

        for entry in sessions.values() {
            snapshot.push(entry.lock().await.snapshot());
        }

        snapshot.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        snapshot
    }

    /// Apply an infallible mutation under the session's lock
    ///
    /// Returns the post-mutation snapshot.
    pub async fn mutate<F>(&self, id: &str, f: F) -> Result<SessionInfo, RegistryError>
    where
        F: FnOnce(&mut StreamSession),
    {
        self.try_mutate(id, |session| {
            f(session);
            Ok(())
        })
        .await
    }

    /// Apply a fallible mutation under the session's lock
    ///
    /// The closure's error is returned as-is; on error the closure is
    /// responsible for leaving the session unchanged.
    pub async fn try_mutate<F>(&self, id: &str, f: F) -> Result<SessionInfo, RegistryError>
    where
        F: FnOnce(&mut StreamSession) -> Result<(), RegistryError>,
    {
        let sessions = self.sessions.read().await;

        let entry = sessions
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let mut session = entry.lock().await;
        f(&mut session)?;
        Ok(session.snapshot())
    }

    /// Check if a session is registered
    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
