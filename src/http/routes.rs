//! Query endpoints and playback file serving

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::orchestrator::HealthReport;
use crate::session::{SessionDetail, SessionSummary};

use super::error::ApiResult;
use super::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.orchestrator.health().await)
}

pub async fn list_streams(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.orchestrator.list_sessions().await)
}

pub async fn stream_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionDetail>> {
    Ok(Json(state.orchestrator.session_detail(&id).await?))
}

/// Serve a manifest or segment of a session
pub async fn playback_file(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> ApiResult<Response> {
    let file = state
        .orchestrator
        .playback_file(&id, &filename)
        .await
        .inspect_err(|e| {
            if !e.is_not_found() {
                tracing::warn!(stream = %id, file = %filename, error = %e, "Playback read failed");
            }
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type()),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        file.body,
    )
        .into_response())
}
