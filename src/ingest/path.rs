//! Publish path handling

use crate::artifacts::is_valid_component;

/// Strip any `?query` suffix from a publish path
pub fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or_default()
}

/// Derive a session id from a publish path
///
/// `/live/stream1?key=abc` → `stream1`. Returns `None` when the final segment
/// cannot name a directory (empty, hidden, or containing separators).
pub fn session_id_from_path(path: &str) -> Option<String> {
    let segment = strip_query(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .last()?;

    is_valid_component(segment).then(|| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_segment() {
        assert_eq!(session_id_from_path("/live/stream1"), Some("stream1".into()));
        assert_eq!(session_id_from_path("live/alpha/"), Some("alpha".into()));
        assert_eq!(session_id_from_path("alpha"), Some("alpha".into()));
    }

    #[test]
    fn test_query_is_ignored() {
        assert_eq!(session_id_from_path("/live/alpha?key=secret"), Some("alpha".into()));
        assert_eq!(strip_query("/live/alpha?key=secret"), "/live/alpha");
    }

    #[test]
    fn test_unusable_paths() {
        assert_eq!(session_id_from_path(""), None);
        assert_eq!(session_id_from_path("/"), None);
        assert_eq!(session_id_from_path("/live/.."), None);
        assert_eq!(session_id_from_path("/live/.hidden"), None);
        assert_eq!(session_id_from_path("/live/a\\b"), None);
    }
}
