//! Admission policy hooks
//!
//! Called synchronously for connect and publish attempts. Authentication is
//! not implemented here; a deployment plugs its own policy in.

use super::context::IngestContext;

/// Result of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Allow the request
    Accept,
    /// Refuse the request with a reason
    Reject(String),
}

impl AuthResult {
    pub fn is_accept(&self) -> bool {
        matches!(self, AuthResult::Accept)
    }
}

/// Accept/reject hooks for ingestion attempts
pub trait IngestPolicy: Send + Sync + 'static {
    /// Called for every connection attempt
    fn on_connect(&self, _ctx: &IngestContext) -> AuthResult {
        AuthResult::Accept
    }

    /// Called before a publish attempt is turned into a session
    fn on_publish(&self, _ctx: &IngestContext, _path: &str) -> AuthResult {
        AuthResult::Accept
    }
}

/// Default policy: accept everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl IngestPolicy for AcceptAll {}
