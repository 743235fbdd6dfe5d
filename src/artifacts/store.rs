//! Per-session artifact directories
//!
//! Each session owns `root/<id>`. After a session ends its directory is kept
//! for a grace period so players can finish the last segments, then removed.
//! A pending removal is keyed by session id and can be cancelled when the id
//! is published again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use super::error::ArtifactError;
use super::playback::{PlaybackFile, PlaybackKind};

/// Directory under the root where directories are moved before removal
const TRASH_DIR: &str = ".trash";

/// Check that `name` can be used as a single path component
///
/// Hidden names are refused so they can never collide with [`TRASH_DIR`].
pub fn is_valid_component(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

struct PendingCleanup {
    generation: u64,
    task: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingCleanup>>>;

/// Owner of the artifact tree
pub struct ArtifactStore {
    root: PathBuf,
    retries: u32,
    retry_interval: Duration,
    pending: PendingMap,
    next_generation: AtomicU64,
}

impl ArtifactStore {
    /// Create a store rooted at `root` (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retries: 3,
            retry_interval: Duration::from_secs(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Set how often a failed removal is retried before it is abandoned
    pub fn with_retry(mut self, retries: u32, interval: Duration) -> Self {
        self.retries = retries;
        self.retry_interval = interval;
        self
    }

    /// Root of the artifact tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a session
    pub fn dir_for(&self, id: &str) -> Result<PathBuf, ArtifactError> {
        if !is_valid_component(id) {
            return Err(ArtifactError::InvalidName(id.to_string()));
        }
        Ok(self.root.join(id))
    }

    /// Create the session directory (and missing ancestors)
    ///
    /// Idempotent: preparing an existing directory returns the same path.
    pub async fn prepare(&self, id: &str) -> Result<PathBuf, ArtifactError> {
        let dir = self.dir_for(id)?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ArtifactError::io(&dir, e))?;

        tracing::debug!(stream = %id, dir = %dir.display(), "Artifact directory prepared");
        Ok(dir)
    }

    /// Remove the session directory after `delay`, unless cancelled
    ///
    /// Rescheduling replaces an earlier pending removal for the same id.
    pub fn schedule_cleanup(&self, id: &str, delay: Duration) -> Result<(), ArtifactError> {
        let dir = self.dir_for(id)?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let cleanup = Cleanup {
            id: id.to_string(),
            dir,
            trash: self.root.join(TRASH_DIR).join(format!("{}-{}", id, generation)),
            generation,
            retries: self.retries,
            retry_interval: self.retry_interval,
            pending: Arc::clone(&self.pending),
        };

        let mut pending = lock(&self.pending);
        let task = tokio::spawn(cleanup.run(delay));

        if let Some(previous) = pending.insert(id.to_string(), PendingCleanup { generation, task }) {
            previous.task.abort();
        }

        tracing::debug!(
            stream = %id,
            delay_ms = delay.as_millis() as u64,
            "Artifact cleanup scheduled"
        );
        Ok(())
    }

    /// Cancel a pending removal
    ///
    /// Returns `true` if one was pending. Once this returns, the cancelled
    /// removal can no longer touch the session directory.
    pub fn cancel_cleanup(&self, id: &str) -> bool {
        match lock(&self.pending).remove(id) {
            Some(pending) => {
                pending.task.abort();
                tracing::info!(stream = %id, "Pending artifact cleanup cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether a removal is pending for `id`
    pub fn is_cleanup_pending(&self, id: &str) -> bool {
        lock(&self.pending).contains_key(id)
    }

    /// Number of pending removals
    pub fn pending_cleanups(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Remove a session directory right away, cancelling any pending timer
    pub async fn remove_now(&self, id: &str) -> Result<(), ArtifactError> {
        let dir = self.dir_for(id)?;
        if let Some(pending) = lock(&self.pending).remove(id) {
            pending.task.abort();
        }

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ArtifactError::io(dir, e)),
        }
    }

    /// Run every pending removal now
    ///
    /// Used on shutdown, when timers would not survive the process. Returns
    /// the number of directories processed.
    pub async fn purge_pending(&self) -> usize {
        let ids: Vec<String> = lock(&self.pending).keys().cloned().collect();

        for id in &ids {
            if let Err(e) = self.remove_now(id).await {
                tracing::warn!(stream = %id, error = %e, "Artifact purge failed");
            }
        }

        let trash = self.root.join(TRASH_DIR);
        if let Err(e) = tokio::fs::remove_dir_all(&trash).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %trash.display(), error = %e, "Trash purge failed");
            }
        }

        ids.len()
    }

    /// Path of a playback file, if it exists
    pub async fn resolve(&self, id: &str, filename: &str) -> Result<PathBuf, ArtifactError> {
        if !is_valid_component(filename) {
            return Err(ArtifactError::InvalidName(filename.to_string()));
        }
        let path = self.dir_for(id)?.join(filename);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(ArtifactError::FileNotFound(filename.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::FileNotFound(filename.to_string()))
            }
            Err(e) => Err(ArtifactError::io(path, e)),
        }
    }

    /// Read a playback file
    pub async fn read(&self, id: &str, filename: &str) -> Result<PlaybackFile, ArtifactError> {
        let path = self.resolve(id, filename).await?;

        let data = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ArtifactError::FileNotFound(filename.to_string()),
            _ => ArtifactError::io(&path, e),
        })?;

        Ok(PlaybackFile {
            kind: PlaybackKind::from_filename(filename),
            body: Bytes::from(data),
        })
    }
}

fn lock(pending: &Mutex<HashMap<String, PendingCleanup>>) -> MutexGuard<'_, HashMap<String, PendingCleanup>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scheduled directory removal
#[derive(Clone)]
struct Cleanup {
    id: String,
    dir: PathBuf,
    trash: PathBuf,
    generation: u64,
    retries: u32,
    retry_interval: Duration,
    pending: PendingMap,
}

impl Cleanup {
    async fn run(self, delay: Duration) {
        tokio::time::sleep(delay).await;

        let Some(target) = self.detach().await else {
            return;
        };

        let mut attempt = 0;
        loop {
            match tokio::fs::remove_dir_all(&target).await {
                Ok(()) => {
                    tracing::info!(stream = %self.id, "Artifacts removed");
                    return;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        stream = %self.id,
                        path = %target.display(),
                        attempt = attempt,
                        error = %e,
                        "Artifact removal failed, retrying"
                    );
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => {
                    tracing::error!(
                        stream = %self.id,
                        path = %target.display(),
                        error = %e,
                        "Artifact removal abandoned"
                    );
                    return;
                }
            }
        }
    }

    /// Run `stage` on the blocking pool
    async fn detach(&self) -> Option<PathBuf> {
        let cleanup = self.clone();
        match tokio::task::spawn_blocking(move || cleanup.stage()).await {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(stream = %self.id, error = %e, "Artifact staging failed");
                None
            }
        }
    }

    /// Commit to the removal and move the directory out of the session's path
    ///
    /// Runs under the pending-map lock so a concurrent `cancel_cleanup` either
    /// wins (and we do nothing) or observes the directory already moved away.
    /// The lock is held across a rename, so this must stay off the runtime.
    fn stage(&self) -> Option<PathBuf> {
        let mut pending = lock(&self.pending);

        if !pending
            .get(&self.id)
            .is_some_and(|p| p.generation == self.generation)
        {
            return None;
        }
        pending.remove(&self.id);

        let staged = self
            .trash
            .parent()
            .map(std::fs::create_dir_all)
            .transpose()
            .and_then(|_| std::fs::rename(&self.dir, &self.trash));

        match staged {
            Ok(()) => Some(self.trash.clone()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.dir.exists() => None,
            Err(e) => {
                tracing::debug!(stream = %self.id, error = %e, "Removing artifacts in place");
                Some(self.dir.clone())
            }
        }
    }
}
