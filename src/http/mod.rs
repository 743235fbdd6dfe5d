//! HTTP and WebSocket surface
//!
//! ```text
//! GET  /health                  liveness + counters
//! GET  /api/streams             session summaries
//! GET  /api/stream/{id}         session detail with manifest URL
//! GET  /hls/{id}/{filename}     manifest / segment files
//! POST /hooks/{connect,publish,unpublish,disconnect}
//! GET  /ws                      real-time events
//! ```

pub mod error;
pub mod hooks;
pub mod routes;
pub mod ws;

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ingest::IngestAdapter;
use crate::orchestrator::Orchestrator;

pub use error::{ApiError, ApiResult};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub ingest: IngestAdapter,
}

impl AppState {
    /// State with the accept-all ingestion policy
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            ingest: IngestAdapter::new(orchestrator.clone()),
            orchestrator,
        }
    }

    pub fn with_ingest(orchestrator: Orchestrator, ingest: IngestAdapter) -> Self {
        Self { orchestrator, ingest }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let playback_route = format!("{}/{{id}}/{{filename}}", state.orchestrator.config().playback_prefix);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/streams", get(routes::list_streams))
        .route("/api/stream/{id}", get(routes::stream_detail))
        .route(&playback_route, get(routes::playback_file))
        .route("/hooks/connect", post(hooks::on_connect))
        .route("/hooks/publish", post(hooks::on_publish))
        .route("/hooks/unpublish", post(hooks::on_unpublish))
        .route("/hooks/disconnect", post(hooks::on_disconnect))
        .route("/ws", get(ws::websocket_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server for the query, hook and subscription surface
pub struct HttpServer {
    bind_addr: SocketAddr,
    state: AppState,
}

impl HttpServer {
    pub fn new(bind_addr: SocketAddr, state: AppState) -> Self {
        Self { bind_addr, state }
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::orchestrator::command::tests::{config, publisher, LONG_RUNNING};

    fn setup(root: &std::path::Path) -> (Orchestrator, Router) {
        let orchestrator = Orchestrator::start(config(root, LONG_RUNNING));
        let app = router(AppState::new(orchestrator.clone()));
        (orchestrator, app)
    }

    async fn get(app: &Router, uri: &str) -> Response {
        app.clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
        app.clone()
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, app) = setup(root.path());

        let response = get(&app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "OK");
        assert_eq!(json["activeStreams"], 0);

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_publish_hook_and_queries() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, app) = setup(root.path());

        let response = post_json(&app, "/hooks/connect", json!({"connectionId": "c1", "app": "live"})).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = post_json(
            &app,
            "/hooks/publish",
            json!({"connectionId": "c1", "path": "/live/alpha?key=abc", "args": {"key": "abc"}}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["accepted"], true);

        let list = body_json(get(&app, "/api/streams").await).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["id"], "alpha");
        assert_eq!(list[0]["viewers"], 0);
        assert!(list[0]["startTime"].is_string());

        let detail = body_json(get(&app, "/api/stream/alpha").await).await;
        assert_eq!(detail["hlsUrl"], "/hls/alpha/index.m3u8");
        assert_eq!(detail["name"], "alpha");

        // Same id from another connection
        let response = post_json(&app, "/hooks/publish", json!({"connectionId": "c2", "path": "/live/alpha"})).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["accepted"], false);

        let response = post_json(&app, "/hooks/unpublish", json!({"connectionId": "c1", "path": "/live/alpha"})).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(orchestrator.registry().is_empty().await);

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_publish_hook_requires_path() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, app) = setup(root.path());

        let response = post_json(&app, "/hooks/publish", json!({"connectionId": "c1"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_stream() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, app) = setup(root.path());

        let response = get(&app, "/api/stream/ghost").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "Stream not found"}));

        let response = get(&app, "/hls/ghost/index.m3u8").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "Stream not found"}));

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_playback_files() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, app) = setup(root.path());

        orchestrator.publish(publisher("c1"), "/live/alpha").await.unwrap();
        tokio::fs::write(root.path().join("alpha").join("index3.ts"), b"ts-data")
            .await
            .unwrap();

        let response = get(&app, "/hls/alpha/index3.ts").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp2t");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(body_bytes(response).await, b"ts-data");

        let response = get(&app, "/hls/alpha/index4.ts").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "File not found"}));

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, app) = setup(root.path());

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/streams")
                    .header(header::ORIGIN, "http://player.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        orchestrator.shutdown().await;
    }
}
