//! Notification fan-out
//!
//! Session-scoped and global topics, plus viewer presence on top of them.

pub mod event;
pub mod hub;
pub mod viewers;

pub use event::{StreamEvent, Topic};
pub use hub::{NotificationHub, Subscription};
pub use viewers::ViewerTracker;
