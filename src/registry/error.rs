//! Registry error types
//!
//! Error types for session registry operations.

use crate::session::SessionState;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Session not found
    NotFound(String),
    /// A session with this id is already registered
    AlreadyExists(String),
    /// The requested state change is not an allowed edge
    InvalidTransition {
        id: String,
        from: SessionState,
        to: SessionState,
    },
    /// A worker event refers to a worker the session no longer owns
    StaleWorker { id: String, worker_id: u64 },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::NotFound(id) => write!(f, "Stream not found: {}", id),
            RegistryError::AlreadyExists(id) => write!(f, "Stream already exists: {}", id),
            RegistryError::InvalidTransition { id, from, to } => {
                write!(f, "Invalid transition for {}: {} -> {}", id, from, to)
            }
            RegistryError::StaleWorker { id, worker_id } => {
                write!(f, "Worker {} is not attached to stream {}", worker_id, id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
