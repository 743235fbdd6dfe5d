//! Stream session orchestrator
//!
//! ```text
//!   ingest callbacks ──► Orchestrator ──► mpsc ──┐
//!                                                 ▼
//!   worker monitors ──► WorkerEvent ──────► CommandLoop ──► SessionRegistry
//!                                                 │                 │
//!                                                 ├──► WorkerController
//!                                                 ├──► ArtifactStore
//!                                                 └──► NotificationHub ◄── ViewerTracker
//! ```
//!
//! Session creation, removal and state transitions happen only on the
//! command loop. Queries read registry snapshots; viewer join/leave mutate
//! the viewer count under the session lock.

pub mod config;
pub(crate) mod command;
mod handle;
pub mod query;

pub use config::OrchestratorConfig;
pub use handle::Orchestrator;
pub use query::HealthReport;
