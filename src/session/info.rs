//! Point-in-time session snapshots
//!
//! Snapshots are plain values: they are handed out by the registry and can be
//! held, serialized and iterated without any lock.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::SessionState;

/// Snapshot of a stream session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    /// Session id (final segment of the publish path)
    pub id: String,
    /// Instance of the session under `id`; a republish gets a new one
    pub generation: u64,
    /// Human-readable name
    pub display_name: String,
    /// Lifecycle state at snapshot time
    pub state: SessionState,
    /// Current viewer count
    pub viewer_count: u32,
    /// When the session was created
    pub started_at: DateTime<Utc>,
    /// Failure description, only set in `Error`
    pub last_error: Option<String>,
    /// Ingestion connection that owns the session
    pub connection_id: String,
    /// Publish path the session was created from
    pub publish_path: String,
    /// Id of the attached worker, if any
    pub worker_id: Option<u64>,
}

impl SessionInfo {
    /// Listing view of this session
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            name: self.display_name.clone(),
            viewers: self.viewer_count,
            status: self.state,
            start_time: self.started_at,
        }
    }

    /// Detail view, including the playback manifest URL
    pub fn detail(&self, hls_url: String) -> SessionDetail {
        SessionDetail {
            summary: self.summary(),
            hls_url,
            error: self.last_error.clone(),
        }
    }
}

/// Listing entry returned by the query surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub viewers: u32,
    pub status: SessionState,
    pub start_time: DateTime<Utc>,
}

/// Single-session detail returned by the query surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub hls_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
