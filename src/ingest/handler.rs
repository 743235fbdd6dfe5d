//! Ingestion boundary callbacks
//!
//! The protocol server (or an HTTP hook relay in front of it) reports four
//! signals: connect attempt, publish attempt, publish stop and disconnect.
//! Attempts are answered with an [`AuthResult`].

use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::orchestrator::Orchestrator;

use super::context::IngestContext;
use super::policy::{AcceptAll, AuthResult, IngestPolicy};

/// Callbacks of the ingestion boundary
pub trait IngestHandler: Send + Sync + 'static {
    /// A client is connecting
    fn on_connect(&self, ctx: &IngestContext) -> impl Future<Output = AuthResult> + Send;

    /// A client wants to publish on `path`
    fn on_publish(&self, ctx: &IngestContext, path: &str) -> impl Future<Output = AuthResult> + Send;

    /// A client stopped publishing on `path`
    fn on_publish_stop(&self, ctx: &IngestContext, path: &str) -> impl Future<Output = ()> + Send;

    /// A connection went away
    fn on_disconnect(&self, ctx: &IngestContext) -> impl Future<Output = ()> + Send;
}

/// Feeds ingestion callbacks into the orchestrator
#[derive(Clone)]
pub struct IngestAdapter {
    orchestrator: Orchestrator,
    policy: Arc<dyn IngestPolicy>,
}

impl IngestAdapter {
    /// Create an adapter that accepts every attempt
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self::with_policy(orchestrator, AcceptAll)
    }

    /// Create an adapter with a custom admission policy
    pub fn with_policy(orchestrator: Orchestrator, policy: impl IngestPolicy) -> Self {
        Self {
            orchestrator,
            policy: Arc::new(policy),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

impl IngestHandler for IngestAdapter {
    async fn on_connect(&self, ctx: &IngestContext) -> AuthResult {
        let result = self.policy.on_connect(ctx);

        match &result {
            AuthResult::Accept => {
                self.orchestrator.stats().connection_opened();
                tracing::debug!(
                    connection = %ctx.connection_id,
                    peer = ?ctx.peer_addr,
                    app = ?ctx.app,
                    "Connection accepted"
                );
            }
            AuthResult::Reject(reason) => {
                tracing::info!(connection = %ctx.connection_id, reason = %reason, "Connection rejected");
            }
        }
        result
    }

    async fn on_publish(&self, ctx: &IngestContext, path: &str) -> AuthResult {
        if let AuthResult::Reject(reason) = self.policy.on_publish(ctx, path) {
            self.orchestrator.stats().publish_rejected();
            tracing::info!(connection = %ctx.connection_id, path = %path, reason = %reason, "Publish refused by policy");
            return AuthResult::Reject(reason);
        }

        match self.orchestrator.publish(ctx.clone(), path).await {
            Ok(_) => AuthResult::Accept,
            Err(e) => AuthResult::Reject(e.to_string()),
        }
    }

    async fn on_publish_stop(&self, ctx: &IngestContext, path: &str) {
        match self.orchestrator.unpublish(ctx.clone(), path).await {
            Ok(()) => {}
            // Logged by the command loop
            Err(Error::Rejected(_)) => {}
            Err(e) => tracing::debug!(connection = %ctx.connection_id, path = %path, error = %e, "Publish stop not applied"),
        }
    }

    async fn on_disconnect(&self, ctx: &IngestContext) {
        self.orchestrator.stats().connection_closed();
        tracing::debug!(connection = %ctx.connection_id, "Connection closed");
    }
}
