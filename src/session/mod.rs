//! Stream session state and snapshots

pub mod info;
pub mod state;

pub use info::{SessionDetail, SessionInfo, SessionSummary};
pub use state::SessionState;
