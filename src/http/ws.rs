//! Real-time subscription socket
//!
//! Every socket follows the global topic. Clients join and leave session
//! topics with `{"type": "join-stream", "stream": "<id>"}` and
//! `{"type": "leave-stream", "stream": "<id>"}`; events are sent as
//! `{"event": "<name>", "data": ...}` text frames.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::notify::{StreamEvent, Subscription, Topic};
use crate::orchestrator::Orchestrator;

use super::AppState;

/// Events buffered per socket before the forwarders wait on the writer
const OUTBOUND_CAPACITY: usize = 256;

/// Largest accepted client frame
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Message sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinStream { stream: String },
    LeaveStream { stream: String },
}

pub async fn websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state.orchestrator))
}

async fn handle_socket(socket: WebSocket, orchestrator: Orchestrator) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(OUTBOUND_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(event = event.name(), error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut viewer = ViewerConnection::new(orchestrator, tx);
    tracing::debug!(viewer = viewer.id(), "WebSocket connected");

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => viewer.handle_text(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(viewer = viewer.id(), error = %e, "WebSocket error");
                break;
            }
        }
    }

    tracing::debug!(viewer = viewer.id(), joined = viewer.joined_count(), "WebSocket disconnected");
    viewer.close().await;
    writer.abort();
}

/// Copies events from one subscription into a socket's outbound queue
///
/// Cancelling hands the subscription back so it can be released properly.
struct Forwarder {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<Subscription>,
}

impl Forwarder {
    fn spawn(
        mut subscription: Subscription,
        outbound: mpsc::Sender<StreamEvent>,
        filter: fn(&StreamEvent) -> bool,
    ) -> Self {
        let (cancel, mut cancelled) = oneshot::channel();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    event = subscription.recv() => match event {
                        Some(event) if filter(&event) => {
                            if outbound.send(event).await.is_err() {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            subscription
        });

        Self { cancel, task }
    }

    async fn stop(self) -> Option<Subscription> {
        let _ = self.cancel.send(());
        self.task.await.ok()
    }
}

/// Viewer side of one socket: its global feed and the sessions it joined
pub struct ViewerConnection {
    orchestrator: Orchestrator,
    outbound: mpsc::Sender<StreamEvent>,
    lobby: Option<Forwarder>,
    joined: HashMap<String, Forwarder>,
    id: u64,
}

impl ViewerConnection {
    /// Start following the global topic
    pub fn new(orchestrator: Orchestrator, outbound: mpsc::Sender<StreamEvent>) -> Self {
        let subscription = orchestrator.subscribe(Topic::Global);
        let id = subscription.id();
        let lobby = Forwarder::spawn(subscription, outbound.clone(), |_| true);

        Self {
            orchestrator,
            outbound,
            lobby: Some(lobby),
            joined: HashMap::new(),
            id,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of session topics joined
    pub fn joined_count(&self) -> usize {
        self.joined.len()
    }

    /// Apply one client frame; malformed frames are ignored
    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::JoinStream { stream }) => self.join(&stream).await,
            Ok(ClientMessage::LeaveStream { stream }) => self.leave(&stream).await,
            Err(e) => tracing::debug!(viewer = self.id, error = %e, "Ignoring malformed client message"),
        }
    }

    /// Join a session topic
    ///
    /// The session's `stream-info` is queued before any topic event, so the
    /// client sees the snapshot and then its own `viewer-count`.
    pub async fn join(&mut self, id: &str) {
        if self.joined.contains_key(id) {
            return;
        }

        let (subscription, info) = self.orchestrator.join_viewer(id).await;
        if let Some(info) = info {
            let detail = info.detail(self.orchestrator.config().manifest_url(id));
            let _ = self.outbound.send(StreamEvent::StreamInfo(detail)).await;
        }

        // Lifecycle events already arrive through the global feed
        let forwarder = Forwarder::spawn(subscription, self.outbound.clone(), |e| !e.is_global());
        self.joined.insert(id.to_string(), forwarder);
    }

    /// Leave a session topic; leaving a topic never joined is a no-op
    pub async fn leave(&mut self, id: &str) {
        let Some(forwarder) = self.joined.remove(id) else {
            return;
        };
        if let Some(subscription) = forwarder.stop().await {
            self.orchestrator.leave_viewer(subscription).await;
        }
    }

    /// Leave every joined session and drop the global feed
    pub async fn close(&mut self) {
        let ids: Vec<String> = self.joined.keys().cloned().collect();
        for id in ids {
            self.leave(&id).await;
        }

        if let Some(lobby) = self.lobby.take() {
            if let Some(subscription) = lobby.stop().await {
                self.orchestrator.unsubscribe(subscription);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_format() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"join-stream","stream":"alpha"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinStream { stream: "alpha".into() });

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"leave-stream","stream":"alpha"}"#).unwrap();
        assert_eq!(msg, ClientMessage::LeaveStream { stream: "alpha".into() });

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"chat","stream":"alpha"}"#).is_err());
    }

    #[cfg(unix)]
    mod viewer {
        use std::time::Duration;

        use super::*;
        use crate::orchestrator::command::tests::{config, publisher, LONG_RUNNING};
        use crate::session::SessionState;

        async fn next(rx: &mut mpsc::Receiver<StreamEvent>) -> StreamEvent {
            tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("outbound closed")
        }

        /// Skip events of the global feed until one matches
        async fn next_matching(
            rx: &mut mpsc::Receiver<StreamEvent>,
            pred: impl Fn(&StreamEvent) -> bool,
        ) -> StreamEvent {
            loop {
                let event = next(rx).await;
                if pred(&event) {
                    return event;
                }
            }
        }

        fn is_count(event: &StreamEvent) -> bool {
            matches!(event, StreamEvent::ViewerCount { .. })
        }

        #[tokio::test]
        async fn test_join_sends_info_then_count() {
            let root = tempfile::tempdir().unwrap();
            let orchestrator = Orchestrator::start(config(root.path(), LONG_RUNNING));
            orchestrator.publish(publisher("c1"), "/live/alpha").await.unwrap();

            let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
            let mut viewer = ViewerConnection::new(orchestrator.clone(), tx);
            viewer.handle_text(r#"{"type":"join-stream","stream":"alpha"}"#).await;

            match next_matching(&mut rx, |e| matches!(e, StreamEvent::StreamInfo(_))).await {
                StreamEvent::StreamInfo(detail) => {
                    assert_eq!(detail.summary.id, "alpha");
                    assert_eq!(detail.summary.viewers, 1);
                    assert_eq!(detail.hls_url, "/hls/alpha/index.m3u8");
                }
                other => panic!("unexpected event {:?}", other),
            }
            assert_eq!(
                next_matching(&mut rx, is_count).await,
                StreamEvent::ViewerCount { id: "alpha".into(), count: 1 }
            );

            // Joining twice does not count twice
            viewer.join("alpha").await;
            assert_eq!(viewer.joined_count(), 1);
            assert_eq!(orchestrator.registry().get("alpha").await.unwrap().viewer_count, 1);

            orchestrator.shutdown().await;
        }

        #[tokio::test]
        async fn test_close_leaves_every_stream() {
            let root = tempfile::tempdir().unwrap();
            let orchestrator = Orchestrator::start(config(root.path(), LONG_RUNNING));
            orchestrator.publish(publisher("c1"), "/live/alpha").await.unwrap();
            orchestrator.publish(publisher("c2"), "/live/beta").await.unwrap();

            let (tx, _rx) = mpsc::channel(OUTBOUND_CAPACITY);
            let mut viewer = ViewerConnection::new(orchestrator.clone(), tx);
            viewer.join("alpha").await;
            viewer.join("beta").await;

            let (other_tx, _other_rx) = mpsc::channel(OUTBOUND_CAPACITY);
            let mut other = ViewerConnection::new(orchestrator.clone(), other_tx);
            other.join("alpha").await;

            assert_eq!(orchestrator.registry().get("alpha").await.unwrap().viewer_count, 2);

            viewer.close().await;

            assert_eq!(orchestrator.registry().get("alpha").await.unwrap().viewer_count, 1);
            assert_eq!(orchestrator.registry().get("beta").await.unwrap().viewer_count, 0);
            assert_eq!(orchestrator.hub().subscriber_count(&Topic::Global), 1);

            other.close().await;
            orchestrator.shutdown().await;
        }

        #[tokio::test]
        async fn test_lifecycle_events_reach_joined_viewer() {
            let root = tempfile::tempdir().unwrap();
            let orchestrator = Orchestrator::start(config(root.path(), LONG_RUNNING));
            orchestrator.publish(publisher("c1"), "/live/alpha").await.unwrap();
            crate::orchestrator::command::tests::wait_for_state(&orchestrator, "alpha", SessionState::Streaming)
                .await;

            let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
            let mut viewer = ViewerConnection::new(orchestrator.clone(), tx);
            viewer.join("alpha").await;

            orchestrator.unpublish(publisher("c1"), "/live/alpha").await.unwrap();

            next_matching(&mut rx, |e| matches!(e, StreamEvent::StreamEnded { .. })).await;
            next_matching(&mut rx, |e| matches!(e, StreamEvent::StreamRemoved { .. })).await;

            viewer.close().await;
            orchestrator.shutdown().await;
        }
    }
}
