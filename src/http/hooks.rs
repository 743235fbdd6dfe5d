//! Ingestion callbacks delivered over HTTP
//!
//! A protocol server with HTTP hooks (nginx-rtmp `on_publish`, SRS
//! `http_hooks`) POSTs here. Attempts are answered `200` to accept and
//! `403` to reject.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::ingest::{AuthResult, IngestContext, IngestHandler};

use super::error::ApiError;
use super::AppState;

/// Hook request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookRequest {
    #[serde(flatten)]
    pub ctx: IngestContext,
    #[serde(default)]
    pub path: Option<String>,
}

impl HookRequest {
    fn path(&self) -> Result<&str, ApiError> {
        self.path
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("Missing path"))
    }
}

#[derive(Debug, Serialize)]
struct HookResponse {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn answer(result: AuthResult) -> Response {
    match result {
        AuthResult::Accept => (
            StatusCode::OK,
            Json(HookResponse {
                accepted: true,
                reason: None,
            }),
        )
            .into_response(),
        AuthResult::Reject(reason) => (
            StatusCode::FORBIDDEN,
            Json(HookResponse {
                accepted: false,
                reason: Some(reason),
            }),
        )
            .into_response(),
    }
}

pub async fn on_connect(State(state): State<AppState>, Json(req): Json<HookRequest>) -> Response {
    answer(state.ingest.on_connect(&req.ctx).await)
}

pub async fn on_publish(
    State(state): State<AppState>,
    Json(req): Json<HookRequest>,
) -> Result<Response, ApiError> {
    let path = req.path()?;
    Ok(answer(state.ingest.on_publish(&req.ctx, path).await))
}

pub async fn on_unpublish(
    State(state): State<AppState>,
    Json(req): Json<HookRequest>,
) -> Result<StatusCode, ApiError> {
    let path = req.path()?;
    state.ingest.on_publish_stop(&req.ctx, path).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn on_disconnect(State(state): State<AppState>, Json(req): Json<HookRequest>) -> StatusCode {
    state.ingest.on_disconnect(&req.ctx).await;
    StatusCode::NO_CONTENT
}
