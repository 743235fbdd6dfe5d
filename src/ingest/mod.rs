//! Ingestion event adapter
//!
//! Translates ingestion boundary callbacks into orchestrator commands.

pub mod context;
pub mod handler;
pub mod path;
pub mod policy;

pub use context::IngestContext;
pub use handler::{IngestAdapter, IngestHandler};
pub use path::session_id_from_path;
pub use policy::{AcceptAll, AuthResult, IngestPolicy};
