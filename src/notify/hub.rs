//! In-memory topic fan-out
//!
//! One `tokio::sync::broadcast` channel per topic, created on first
//! subscription and dropped when its last subscriber leaves. A subscription
//! dropped without `unsubscribe` leaves an empty channel behind; those are
//! pruned on the next subscribe, or when a publish finds nobody listening.
//! Subscribers only see events published after they subscribed; there is no
//! backlog.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use super::event::{StreamEvent, Topic};

/// Default per-topic channel capacity
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// A subscription to one topic
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    topic: Topic,
    rx: broadcast::Receiver<StreamEvent>,
    /// Generation of the session this subscriber was counted on
    counted_on: Option<u64>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn counted_on(&self) -> Option<u64> {
        self.counted_on
    }

    pub(crate) fn set_counted_on(&mut self, generation: u64) {
        self.counted_on = Some(generation);
    }

    /// Receive the next event
    ///
    /// Skips over events lost to lag. Returns `None` once the topic is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        topic = %self.topic,
                        subscription = self.id,
                        skipped = skipped,
                        "Subscriber lagged, events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive an already-published event without waiting
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Publish/subscribe hub keyed by topic
pub struct NotificationHub {
    topics: RwLock<HashMap<Topic, broadcast::Sender<StreamEvent>>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a hub whose topics buffer up to `capacity` events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to a topic
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics.retain(|_, tx| tx.receiver_count() > 0);

        let rx = topics
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(topic = %topic, subscription = id, "Subscribed");
        Subscription {
            id,
            topic,
            rx,
            counted_on: None,
        }
    }

    /// Drop a subscription; the topic goes away with its last subscriber
    pub fn unsubscribe(&self, subscription: Subscription) {
        let Subscription { id, topic, rx, .. } = subscription;
        drop(rx);

        self.prune(&topic);
        tracing::trace!(topic = %topic, subscription = id, "Unsubscribed");
    }

    /// Deliver `event` to every current subscriber of `topic`
    ///
    /// Returns the number of subscribers it was delivered to.
    pub fn publish(&self, topic: &Topic, event: StreamEvent) -> usize {
        let (delivered, abandoned) = {
            let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
            match topics.get(topic) {
                Some(tx) => {
                    let delivered = tx.send(event.clone()).unwrap_or(0);
                    (delivered, delivered == 0)
                }
                None => (0, false),
            }
        };

        if abandoned {
            self.prune(topic);
        }

        tracing::debug!(
            topic = %topic,
            event = event.name(),
            subscribers = delivered,
            "Event published"
        );
        delivered
    }

    /// Drop `topic` if every subscription to it is gone
    fn prune(&self, topic: &Topic) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if topics.get(topic).is_some_and(|tx| tx.receiver_count() == 0) {
            topics.remove(topic);
            tracing::trace!(topic = %topic, "Abandoned topic pruned");
        }
    }

    /// Number of subscribers of a topic
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    /// Number of topics held, including any not yet pruned
    pub fn topic_count(&self) -> usize {
        self.topics.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
