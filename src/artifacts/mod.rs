//! Artifact lifecycle
//!
//! Session output directories: created before the worker starts, kept for a
//! grace period after the session ends, then removed by a cancellable timer.

pub mod error;
pub mod playback;
pub mod store;

pub use error::ArtifactError;
pub use playback::{PlaybackFile, PlaybackKind};
pub use store::{is_valid_component, ArtifactStore};
