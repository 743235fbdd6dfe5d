//! Playback file types

use bytes::Bytes;

/// Content type of HLS playlists
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Content type of MPEG-TS segments
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// Kind of playback artifact, derived from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackKind {
    /// `.m3u8` playlist
    Manifest,
    /// Anything else the worker writes
    Segment,
}

impl PlaybackKind {
    pub fn from_filename(filename: &str) -> Self {
        let is_manifest = std::path::Path::new(filename)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("m3u8"));

        if is_manifest {
            PlaybackKind::Manifest
        } else {
            PlaybackKind::Segment
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            PlaybackKind::Manifest => MANIFEST_CONTENT_TYPE,
            PlaybackKind::Segment => SEGMENT_CONTENT_TYPE,
        }
    }
}

/// A playback file read from a session's artifact directory
#[derive(Debug, Clone)]
pub struct PlaybackFile {
    pub kind: PlaybackKind,
    pub body: Bytes,
}

impl PlaybackFile {
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}
