//! Ingestion callback context
//!
//! Metadata the ingestion boundary passes along with each callback.

use std::collections::HashMap;
use std::net::SocketAddr;

use serde::Deserialize;

/// Context passed to ingestion callbacks
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestContext {
    /// Connection id assigned by the ingestion boundary
    pub connection_id: String,

    /// Remote peer address, if reported
    #[serde(default)]
    pub peer_addr: Option<SocketAddr>,

    /// Application name (e.g. "live")
    #[serde(default)]
    pub app: Option<String>,

    /// Free-form callback arguments
    #[serde(default)]
    pub args: HashMap<String, String>,
}

impl IngestContext {
    /// Create a context for a connection
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            ..Default::default()
        }
    }

    /// Set the peer address
    pub fn with_peer(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Set the application name
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Get a callback argument
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let ctx: IngestContext = serde_json::from_str(r#"{"connectionId":"c1"}"#).unwrap();

        assert_eq!(ctx.connection_id, "c1");
        assert!(ctx.peer_addr.is_none());
        assert!(ctx.args.is_empty());
    }

    #[test]
    fn test_deserialize_full() {
        let ctx: IngestContext = serde_json::from_str(
            r#"{"connectionId":"c2","peerAddr":"10.0.0.1:50000","app":"live","args":{"key":"abc"}}"#,
        )
        .unwrap();

        assert_eq!(ctx.peer_addr.unwrap().port(), 50000);
        assert_eq!(ctx.app.as_deref(), Some("live"));
        assert_eq!(ctx.arg("key"), Some("abc"));
    }
}
