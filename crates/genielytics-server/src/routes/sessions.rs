use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{error::AppError, state::AppState};

/// `GET /api/sessions/{id}` — direct rollup lookup.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let rollup = state
        .analytics
        .get_session(&session_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    Ok(Json(json!({ "data": rollup })))
}

/// `POST /api/sessions/{id}/reconcile` — rebuild the rollup from the event
/// log. The recovery path for the dual-write gap: counters come back equal
/// to the per-type event counts no matter what the paired writes left
/// behind.
#[tracing::instrument(skip(state))]
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let rollup = state
        .analytics
        .reconcile_session(&session_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("No events recorded for session".to_string()))?;

    Ok(Json(json!({ "data": rollup })))
}
