//! Artifact error types

use std::path::PathBuf;

/// Error type for artifact operations
#[derive(Debug)]
pub enum ArtifactError {
    /// Session id or file name is not usable as a path component
    InvalidName(String),
    /// Requested playback file does not exist
    FileNotFound(String),
    /// Filesystem operation failed
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ArtifactError {
    pub(super) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArtifactError::Io {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactError::InvalidName(name) => write!(f, "Invalid artifact name: {}", name),
            ArtifactError::FileNotFound(name) => write!(f, "File not found: {}", name),
            ArtifactError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
