//! Orchestrator configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::notify::hub::DEFAULT_TOPIC_CAPACITY;
use crate::worker::WorkerConfig;

/// Orchestrator configuration options
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root of the per-session artifact directories
    pub hls_root: PathBuf,

    /// URL prefix under which artifacts are served
    pub playback_prefix: String,

    /// Grace period between publish-stop and artifact removal
    pub cleanup_delay: Duration,

    /// Retries for a failed artifact removal before it is abandoned
    pub cleanup_retries: u32,

    /// Pause between artifact removal retries
    pub cleanup_retry_interval: Duration,

    /// Per-subscriber event buffer of each topic
    pub event_capacity: usize,

    /// Capacity of the orchestrator command queue
    pub command_capacity: usize,

    /// How long shutdown waits for workers to exit
    pub shutdown_timeout: Duration,

    /// Remove artifact directories on shutdown instead of leaving them behind
    pub purge_on_shutdown: bool,

    /// Transcoding worker settings
    pub worker: WorkerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            hls_root: PathBuf::from("hls"),
            playback_prefix: "/hls".to_string(),
            cleanup_delay: Duration::from_secs(30),
            cleanup_retries: 3,
            cleanup_retry_interval: Duration::from_secs(1),
            event_capacity: DEFAULT_TOPIC_CAPACITY,
            command_capacity: 256,
            shutdown_timeout: Duration::from_secs(5),
            purge_on_shutdown: true,
            worker: WorkerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Create a new config with a custom artifact root
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            hls_root: root.into(),
            ..Default::default()
        }
    }

    /// Set the artifact root
    pub fn hls_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.hls_root = root.into();
        self
    }

    /// Set the playback URL prefix
    pub fn playback_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.playback_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the artifact grace period
    pub fn cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    /// Set the artifact removal retry policy
    pub fn cleanup_retry(mut self, retries: u32, interval: Duration) -> Self {
        self.cleanup_retries = retries;
        self.cleanup_retry_interval = interval;
        self
    }

    /// Set the shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Keep artifact directories on shutdown
    pub fn keep_artifacts_on_shutdown(mut self) -> Self {
        self.purge_on_shutdown = false;
        self
    }

    /// Set the worker configuration
    pub fn worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    /// Playback manifest URL of a session
    pub fn manifest_url(&self, id: &str) -> String {
        format!("{}/{}/{}", self.playback_prefix, id, self.worker.manifest_name)
    }
}
