//! Orchestrator statistics

pub mod metrics;

pub use metrics::{OrchestratorStats, StatsSnapshot};
