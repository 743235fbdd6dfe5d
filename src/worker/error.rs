//! Worker error types

/// Error type for worker controller operations
#[derive(Debug)]
pub enum WorkerError {
    /// A worker is already running for this session
    AlreadyRunning(String),
    /// The worker process could not be spawned
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::AlreadyRunning(id) => {
                write!(f, "Worker already running for stream: {}", id)
            }
            WorkerError::Spawn { program, source } => {
                write!(f, "Failed to spawn {}: {}", program, source)
            }
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Spawn { source, .. } => Some(source),
            WorkerError::AlreadyRunning(_) => None,
        }
    }
}
