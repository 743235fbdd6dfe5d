//! Session state machine
//!
//! Tracks the lifecycle of a stream session from publish to teardown.
//!
//! ```text
//!   Starting ──started──► Streaming
//!      │                     │
//!      ├──failed────────────►├──► Error   (terminal)
//!      └──completed/stop────►└──► Ended   (terminal)
//! ```

use serde::Serialize;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Worker launched, waiting for its start signal
    Starting,
    /// Worker confirmed it is producing output
    Streaming,
    /// Worker failed; terminal
    Error,
    /// Worker completed or was stopped; terminal
    Ended,
}

impl SessionState {
    /// Check whether `next` is an allowed edge from this state
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Starting, Streaming) | (Starting | Streaming, Error) | (Starting | Streaming, Ended)
        )
    }

    /// Starting or Streaming; a worker is attached in these states
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Streaming)
    }

    /// Error or Ended; no transition leaves these states
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Lowercase name, as reported to clients
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Starting => "starting",
            SessionState::Streaming => "streaming",
            SessionState::Error => "error",
            SessionState::Ended => "ended",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
