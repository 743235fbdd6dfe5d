//! Read-only queries served straight from the registry and artifact store

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::artifacts::PlaybackFile;
use crate::error::{Error, Result};
use crate::session::{SessionDetail, SessionSummary};
use crate::stats::StatsSnapshot;

use super::handle::Orchestrator;

/// Liveness report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub active_streams: usize,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub stats: StatsSnapshot,
}

impl Orchestrator {
    /// Summaries of every registered session, oldest first
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.shared
            .registry
            .list_all()
            .await
            .iter()
            .map(|info| info.summary())
            .collect()
    }

    /// Detail of one session, including its manifest URL
    pub async fn session_detail(&self, id: &str) -> Result<SessionDetail> {
        let info = self.shared.registry.get(id).await?;
        Ok(info.detail(self.shared.config.manifest_url(id)))
    }

    /// Read a playback file of a known session
    ///
    /// `NotFound` when the session is unknown, `FileNotFound` when the file
    /// is absent.
    pub async fn playback_file(&self, id: &str, filename: &str) -> Result<PlaybackFile> {
        if !self.shared.registry.contains(id).await {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(self.shared.artifacts.read(id, filename).await?)
    }

    pub async fn health(&self) -> HealthReport {
        let stats = self.shared.stats.snapshot();

        HealthReport {
            status: "OK",
            active_streams: self.shared.registry.len().await,
            timestamp: Utc::now(),
            uptime_secs: stats.uptime_secs,
            stats,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::artifacts::playback::{MANIFEST_CONTENT_TYPE, SEGMENT_CONTENT_TYPE};
    use crate::orchestrator::command::tests::{config, publisher, wait_for_state, LONG_RUNNING};
    use crate::session::SessionState;

    #[tokio::test]
    async fn test_list_and_detail() {
        let root = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::start(config(root.path(), LONG_RUNNING));

        assert!(orchestrator.list_sessions().await.is_empty());

        orchestrator.publish(publisher("c1"), "/live/alpha?key=secret").await.unwrap();
        orchestrator.publish(publisher("c2"), "/live/beta").await.unwrap();

        let list = orchestrator.list_sessions().await;
        let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"alpha") && ids.contains(&"beta"));

        let detail = assert_ok!(orchestrator.session_detail("alpha").await);
        assert_eq!(detail.summary.name, "alpha");
        assert_eq!(detail.hls_url, "/hls/alpha/index.m3u8");
        assert_eq!(detail.error, None);

        let missing = assert_err!(orchestrator.session_detail("ghost").await);
        assert!(matches!(missing, Error::NotFound(_)));

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_detail_carries_worker_error() {
        let root = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::start(config(root.path(), "echo 'decode error' >&2; exit 1"));

        orchestrator.publish(publisher("c1"), "/live/alpha").await.unwrap();
        wait_for_state(&orchestrator, "alpha", SessionState::Error).await;

        let detail = orchestrator.session_detail("alpha").await.unwrap();
        assert_eq!(detail.summary.status, SessionState::Error);
        assert_eq!(detail.error.as_deref(), Some("decode error"));

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_playback_file() {
        let root = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::start(config(root.path(), LONG_RUNNING));

        orchestrator.publish(publisher("c1"), "/live/alpha").await.unwrap();
        tokio::fs::write(root.path().join("alpha").join("index1.ts"), b"segment")
            .await
            .unwrap();

        let segment = orchestrator.playback_file("alpha", "index1.ts").await.unwrap();
        assert_eq!(segment.content_type(), SEGMENT_CONTENT_TYPE);
        assert_eq!(&segment.body[..], b"segment");

        // Written by the worker script
        wait_for_state(&orchestrator, "alpha", SessionState::Streaming).await;
        let mut manifest = None;
        for _ in 0..100 {
            if let Ok(file) = orchestrator.playback_file("alpha", "index.m3u8").await {
                manifest = Some(file);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(manifest.unwrap().content_type(), MANIFEST_CONTENT_TYPE);

        let err = orchestrator.playback_file("alpha", "index9.ts").await.unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));

        let err = orchestrator.playback_file("ghost", "index.m3u8").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = orchestrator.playback_file("alpha", "../beta").await.unwrap_err();
        assert!(err.is_not_found());

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_health() {
        let root = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::start(config(root.path(), LONG_RUNNING));

        orchestrator.publish(publisher("c1"), "/live/alpha").await.unwrap();

        let health = orchestrator.health().await;
        assert_eq!(health.status, "OK");
        assert_eq!(health.active_streams, 1);
        assert_eq!(health.stats.sessions_created, 1);

        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["activeStreams"], 1);
        assert!(json["stats"]["sessionsCreated"].is_number());

        orchestrator.shutdown().await;
    }
}
