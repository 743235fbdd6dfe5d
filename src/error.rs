//! Crate-level error type
//!
//! Each component has its own error enum; this type is what the
//! orchestrator and the query surface hand back to callers.

use crate::artifacts::ArtifactError;
use crate::registry::RegistryError;
use crate::worker::WorkerError;

/// Result alias used throughout the orchestrator
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for orchestrator operations
#[derive(Debug)]
pub enum Error {
    /// A session with this id is already active
    AlreadyExists(String),
    /// Unknown session id
    NotFound(String),
    /// A requested playback file is absent (or its name is unusable)
    FileNotFound(String),
    /// The transcoding worker could not be started or exited abnormally
    WorkerFailure(String),
    /// A lifecycle change did not apply to the session as it stands
    InvalidState(String),
    /// Artifact directory creation or removal failed
    ArtifactIo(ArtifactError),
    /// Publish path does not yield a usable session id
    InvalidPath(String),
    /// The ingestion policy refused the request
    Rejected(String),
    /// The orchestrator is shutting down and no longer accepts commands
    ShuttingDown,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AlreadyExists(id) => write!(f, "Stream already active: {}", id),
            Error::NotFound(id) => write!(f, "Stream not found: {}", id),
            Error::FileNotFound(name) => write!(f, "File not found: {}", name),
            Error::WorkerFailure(reason) => write!(f, "Worker failure: {}", reason),
            Error::InvalidState(reason) => write!(f, "Invalid session state: {}", reason),
            Error::ArtifactIo(e) => write!(f, "Artifact I/O failure: {}", e),
            Error::InvalidPath(path) => write!(f, "Invalid publish path: {}", path),
            Error::Rejected(reason) => write!(f, "Rejected: {}", reason),
            Error::ShuttingDown => write!(f, "Orchestrator is shutting down"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ArtifactIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::AlreadyExists(id) => Error::AlreadyExists(id),
            RegistryError::NotFound(id) => Error::NotFound(id),
            other @ (RegistryError::InvalidTransition { .. } | RegistryError::StaleWorker { .. }) => {
                Error::InvalidState(other.to_string())
            }
        }
    }
}

impl From<WorkerError> for Error {
    fn from(e: WorkerError) -> Self {
        Error::WorkerFailure(e.to_string())
    }
}

impl From<ArtifactError> for Error {
    fn from(e: ArtifactError) -> Self {
        match e {
            ArtifactError::FileNotFound(name) => Error::FileNotFound(name),
            ArtifactError::InvalidName(name) => Error::FileNotFound(name),
            other => Error::ArtifactIo(other),
        }
    }
}

impl Error {
    /// Whether this error should surface as a "not found" response
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::FileNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn test_registry_error_mapping() {
        let err: Error = RegistryError::AlreadyExists("alpha".into()).into();
        assert!(matches!(err, Error::AlreadyExists(ref id) if id == "alpha"));

        let err: Error = RegistryError::NotFound("beta".into()).into();
        assert!(err.is_not_found());

        let err: Error = RegistryError::StaleWorker { id: "alpha".into(), worker_id: 3 }.into();
        assert!(matches!(err, Error::InvalidState(_)));

        let err: Error = RegistryError::InvalidTransition {
            id: "alpha".into(),
            from: SessionState::Ended,
            to: SessionState::Streaming,
        }
        .into();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(err.to_string().starts_with("Invalid session state"));
    }

    #[test]
    fn test_artifact_missing_file_is_not_found() {
        let err: Error = ArtifactError::FileNotFound("seg1.ts".into()).into();
        assert!(err.is_not_found());
        assert!(matches!(err, Error::FileNotFound(_)));
        assert_eq!(err.to_string(), "File not found: seg1.ts");
    }
}
