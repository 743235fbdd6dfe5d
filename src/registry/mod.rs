//! Session registry
//!
//! The registry exclusively owns every active stream session. Other
//! components refer to sessions by id and only ever see snapshots.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<SessionRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ sessions: RwLock<HashMap<id, │
//!                 │   Mutex<StreamSession {      │
//!                 │     state, viewer_count,     │
//!                 │     worker: Option<Handle>,  │
//!                 │   }>                         │
//!                 │ >>                           │
//!                 └──────────────┬───────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!  [Orchestrator]           [Viewers]              [Query surface]
//!  create / remove          mutate(viewers)        get / list_all
//!  try_mutate(state)
//! ```

pub mod entry;
pub mod error;
pub mod store;

pub use entry::StreamSession;
pub use error::RegistryError;
pub use store::SessionRegistry;
