//! Notification topics and events

use serde::Serialize;

use crate::session::{SessionDetail, SessionSummary};

/// Notification topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Lobby topic: stream created/removed and lifecycle mirrors
    Global,
    /// Per-session topic
    Session(String),
}

impl Topic {
    pub fn session(id: impl Into<String>) -> Self {
        Topic::Session(id.into())
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Global => f.write_str("global"),
            Topic::Session(id) => write!(f, "stream:{}", id),
        }
    }
}

/// Event delivered to subscribers
///
/// Serialized as `{"event": "<kebab-case name>", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Sent to a viewer right after it joins
    StreamInfo(SessionDetail),
    /// New viewer total of a session
    ViewerCount { id: String, count: u32 },
    /// A session was created
    StreamCreated(SessionSummary),
    /// The worker started producing output
    StreamStarted {
        id: String,
        name: String,
        #[serde(rename = "hlsUrl")]
        hls_url: String,
    },
    /// The worker failed
    StreamError {
        id: String,
        name: String,
        error: String,
    },
    /// The session ended
    StreamEnded { id: String, name: String },
    /// The session was removed from the registry
    StreamRemoved { id: String },
}

impl StreamEvent {
    /// Kebab-case event name
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::StreamInfo(_) => "stream-info",
            StreamEvent::ViewerCount { .. } => "viewer-count",
            StreamEvent::StreamCreated(_) => "stream-created",
            StreamEvent::StreamStarted { .. } => "stream-started",
            StreamEvent::StreamError { .. } => "stream-error",
            StreamEvent::StreamEnded { .. } => "stream-ended",
            StreamEvent::StreamRemoved { .. } => "stream-removed",
        }
    }

    /// Whether the event is also published on the global topic
    pub fn is_global(&self) -> bool {
        !matches!(self, StreamEvent::StreamInfo(_) | StreamEvent::ViewerCount { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_display() {
        assert_eq!(Topic::Global.to_string(), "global");
        assert_eq!(Topic::session("alpha").to_string(), "stream:alpha");
    }

    #[test]
    fn test_event_wire_format() {
        let event = StreamEvent::StreamStarted {
            id: "alpha".into(),
            name: "alpha".into(),
            hls_url: "/hls/alpha/index.m3u8".into(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "stream-started");
        assert_eq!(json["event"], event.name());
        assert_eq!(json["data"]["hlsUrl"], "/hls/alpha/index.m3u8");

        let json = serde_json::to_value(StreamEvent::ViewerCount { id: "alpha".into(), count: 2 }).unwrap();
        assert_eq!(json["event"], "viewer-count");
        assert_eq!(json["data"]["count"], 2);
    }

    #[test]
    fn test_global_events() {
        assert!(StreamEvent::StreamRemoved { id: "alpha".into() }.is_global());
        assert!(!StreamEvent::ViewerCount { id: "alpha".into(), count: 0 }.is_global());
    }
}
