//! Live stream session orchestrator
//!
//! Publish events from an RTMP ingestion boundary become stream sessions.
//! Each session gets one transcoding worker (ffmpeg by default) writing HLS
//! into its own directory, and session state plus viewer counts are fanned
//! out to subscribers.
//!
//! # Example
//!
//! ```no_run
//! use hls_orchestrator::{IngestContext, Orchestrator, OrchestratorConfig};
//!
//! # async fn run() -> hls_orchestrator::Result<()> {
//! let orchestrator = Orchestrator::start(OrchestratorConfig::with_root("./hls"));
//!
//! let ctx = IngestContext::new("conn-1");
//! let session = orchestrator.publish(ctx.clone(), "/live/alpha").await?;
//! println!("{} is {}", session.id, session.state);
//!
//! orchestrator.unpublish(ctx, "/live/alpha").await?;
//! orchestrator.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod error;
pub mod http;
pub mod ingest;
pub mod notify;
pub mod orchestrator;
pub mod registry;
pub mod session;
pub mod stats;
pub mod worker;

pub use error::{Error, Result};
pub use ingest::{AcceptAll, AuthResult, IngestAdapter, IngestContext, IngestHandler, IngestPolicy};
pub use notify::{StreamEvent, Subscription, Topic};
pub use orchestrator::{HealthReport, Orchestrator, OrchestratorConfig};
pub use session::{SessionDetail, SessionInfo, SessionState, SessionSummary};
pub use worker::WorkerConfig;
