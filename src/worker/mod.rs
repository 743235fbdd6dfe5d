//! Transcode worker control
//!
//! One external transcoding process per session. The controller launches it,
//! a monitor task watches it, and lifecycle signals come back as
//! [`WorkerEvent`]s:
//!
//! ```text
//!   WorkerController::start ──spawn──► process ──► Monitor task
//!                                                    │
//!            Started { pid } ◄───────────────────────┤ (on spawn)
//!            Failed(reason)  ◄───────────────────────┤ (non-zero exit, last stderr line)
//!            Completed       ◄───────────────────────┘ (clean exit or stop request)
//! ```
//!
//! Failures are reported, never retried; retrying is up to the caller.

pub mod config;
pub mod controller;
pub mod error;
pub mod handle;

pub use config::WorkerConfig;
pub use controller::WorkerController;
pub use error::WorkerError;
pub use handle::{TranscodeJob, WorkerEvent, WorkerEventKind, WorkerHandle, WorkerPhase};
