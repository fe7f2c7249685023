use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, identity, state::AppState};

/// `GET /api/conversations/metrics` — the conversation_metrics view, newest
/// started_at first.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .analytics
        .conversation_metrics()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": rows })))
}

#[derive(Debug, Deserialize)]
pub struct ConversationsQuery {
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /api/conversations` — the acting user's conversation history for
/// the chat sidebar, most recently active first.
pub async fn for_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ConversationsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = identity::resolve(&headers, query.user_id.as_deref()).ok_or_else(|| {
        AppError::BadRequest(
            "no user identity: X-Forwarded-User header or user_id required".to_string(),
        )
    })?;

    let limit = query.limit.unwrap_or(50);
    if !(1..=200).contains(&limit) {
        return Err(AppError::BadRequest(
            "limit must be between 1 and 200".to_string(),
        ));
    }

    let conversations = state
        .analytics
        .user_conversations(&user.user_id, limit)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({ "data": conversations })))
}

/// `GET /api/stats/conversations` — conversation-level aggregates (average
/// and median message volume, feedback rate).
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let stats = state
        .analytics
        .conversation_stats()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": stats })))
}
