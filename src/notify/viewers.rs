//! Viewer presence
//!
//! `join` and `leave` are the only mutators of a session's viewer count. The
//! count change and its `viewer-count` event happen under the session's lock,
//! so per-session count events are published in the order they were applied.

use std::sync::Arc;

use crate::registry::{RegistryError, SessionRegistry};
use crate::session::SessionInfo;

use super::event::{StreamEvent, Topic};
use super::hub::{NotificationHub, Subscription};

/// Tracks viewers joining and leaving session topics
#[derive(Clone)]
pub struct ViewerTracker {
    registry: Arc<SessionRegistry>,
    hub: Arc<NotificationHub>,
}

impl ViewerTracker {
    pub fn new(registry: Arc<SessionRegistry>, hub: Arc<NotificationHub>) -> Self {
        Self { registry, hub }
    }

    /// Subscribe to a session's topic and count the viewer
    ///
    /// The subscription is taken before the count is published, so the joiner
    /// sees its own `viewer-count` event. For an unknown session the viewer
    /// is subscribed but not counted, and no snapshot is returned.
    pub async fn join(&self, id: &str) -> (Subscription, Option<SessionInfo>) {
        let topic = Topic::session(id);
        let mut subscription = self.hub.subscribe(topic.clone());

        let result = self
            .registry
            .mutate(id, |session| {
                let count = session.add_viewer();
                self.hub.publish(
                    &topic,
                    StreamEvent::ViewerCount {
                        id: id.to_string(),
                        count,
                    },
                );
            })
            .await;

        match result {
            Ok(info) => {
                tracing::debug!(stream = %id, viewers = info.viewer_count, "Viewer joined");
                subscription.set_counted_on(info.generation);
                (subscription, Some(info))
            }
            Err(RegistryError::NotFound(_)) => {
                tracing::debug!(stream = %id, "Viewer joined unknown stream");
                (subscription, None)
            }
            Err(e) => {
                tracing::warn!(stream = %id, error = %e, "Viewer join failed");
                (subscription, None)
            }
        }
    }

    /// Drop the subscription and uncount the viewer (floored at zero)
    ///
    /// Only the session instance that counted the viewer is decremented.
    /// Returns the new count, or `None` if the viewer was never counted or
    /// that instance is no longer registered.
    pub async fn leave(&self, subscription: Subscription) -> Option<u32> {
        let topic = subscription.topic().clone();
        let counted_on = subscription.counted_on();
        self.hub.unsubscribe(subscription);

        let (Topic::Session(id), Some(generation)) = (&topic, counted_on) else {
            return None;
        };

        let result = self
            .registry
            .mutate(id, |session| {
                if session.generation() != generation {
                    return;
                }
                let count = session.remove_viewer();
                self.hub.publish(
                    &topic,
                    StreamEvent::ViewerCount {
                        id: id.clone(),
                        count,
                    },
                );
            })
            .await;

        match result {
            Ok(info) if info.generation == generation => {
                tracing::debug!(stream = %id, viewers = info.viewer_count, "Viewer left");
                Some(info.viewer_count)
            }
            Ok(_) => {
                tracing::debug!(stream = %id, "Viewer left a replaced session");
                None
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::entry::tests::session;

    async fn setup() -> (ViewerTracker, Arc<NotificationHub>) {
        let registry = Arc::new(SessionRegistry::new());
        let hub = Arc::new(NotificationHub::new());
        registry.create(session("alpha", 1)).await.unwrap();

        (ViewerTracker::new(registry, Arc::clone(&hub)), hub)
    }

    fn count(n: u32) -> Option<StreamEvent> {
        Some(StreamEvent::ViewerCount { id: "alpha".into(), count: n })
    }

    #[tokio::test]
    async fn test_join_and_leave_counts() {
        let (viewers, hub) = setup().await;
        let mut observer = hub.subscribe(Topic::session("alpha"));

        let (first, info) = viewers.join("alpha").await;
        assert_eq!(info.unwrap().viewer_count, 1);
        let (_second, info) = viewers.join("alpha").await;
        assert_eq!(info.unwrap().viewer_count, 2);

        assert_eq!(viewers.leave(first).await, Some(1));

        assert_eq!(observer.recv().await, count(1));
        assert_eq!(observer.recv().await, count(2));
        assert_eq!(observer.recv().await, count(1));
    }

    #[tokio::test]
    async fn test_joiner_sees_its_own_count() {
        let (viewers, _hub) = setup().await;

        let (mut sub, _) = viewers.join("alpha").await;
        assert_eq!(sub.recv().await, count(1));
    }

    #[tokio::test]
    async fn test_uncounted_leave_is_ignored() {
        let (viewers, hub) = setup().await;
        let mut observer = hub.subscribe(Topic::session("alpha"));

        // Leave without a matching join
        let stray = hub.subscribe(Topic::session("alpha"));
        assert_eq!(viewers.leave(stray).await, None);
        assert_eq!(observer.try_recv(), None);

        let (sub, _) = viewers.join("alpha").await;
        assert_eq!(viewers.leave(sub).await, Some(0));
    }

    #[tokio::test]
    async fn test_early_joiner_does_not_steal_count() {
        let registry = Arc::new(SessionRegistry::new());
        let hub = Arc::new(NotificationHub::new());
        let viewers = ViewerTracker::new(Arc::clone(&registry), Arc::clone(&hub));

        let (early, info) = viewers.join("alpha").await;
        assert!(info.is_none());

        registry.create(session("alpha", 1)).await.unwrap();
        let (_late, info) = viewers.join("alpha").await;
        assert_eq!(info.unwrap().viewer_count, 1);

        assert_eq!(viewers.leave(early).await, None);
        assert_eq!(registry.get("alpha").await.unwrap().viewer_count, 1);
    }

    #[tokio::test]
    async fn test_leave_after_republish_spares_new_session() {
        let registry = Arc::new(SessionRegistry::new());
        let hub = Arc::new(NotificationHub::new());
        let viewers = ViewerTracker::new(Arc::clone(&registry), Arc::clone(&hub));

        registry.create(session("alpha", 1)).await.unwrap();
        registry.mutate("alpha", |s| s.mark_failed("boom").unwrap()).await.unwrap();
        let (stale, info) = viewers.join("alpha").await;
        assert_eq!(info.unwrap().viewer_count, 1);

        // Republish replaces the failed session under the same id
        registry.remove("alpha").await.unwrap();
        registry.create(session("alpha", 2)).await.unwrap();
        let (_fresh, info) = viewers.join("alpha").await;
        assert_eq!(info.unwrap().viewer_count, 1);

        let mut observer = hub.subscribe(Topic::session("alpha"));
        assert_eq!(viewers.leave(stale).await, None);
        assert_eq!(registry.get("alpha").await.unwrap().viewer_count, 1);
        assert_eq!(observer.try_recv(), None);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (viewers, hub) = setup().await;

        let (sub, info) = viewers.join("ghost").await;
        assert!(info.is_none());
        assert!(sub.counted_on().is_none());
        assert_eq!(hub.subscriber_count(&Topic::session("ghost")), 1);

        assert_eq!(viewers.leave(sub).await, None);
        assert_eq!(hub.subscriber_count(&Topic::session("ghost")), 0);
    }
}
