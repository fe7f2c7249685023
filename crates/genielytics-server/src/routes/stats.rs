use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, state::AppState};

/// `GET /api/stats/engagement` — headline totals for the dashboard cards.
pub async fn engagement(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let summary = state
        .analytics
        .engagement()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": summary })))
}

/// `GET /api/stats/nps` — Net Promoter Score over all feedback. With zero
/// feedback the score field is null, not an error.
pub async fn nps(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let summary = state.analytics.nps().await.map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": summary })))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// `GET /api/stats/top-questions` — most-asked questions, top 20 by
/// default. Ties break on the normalized question text so the ranking is
/// stable between refreshes.
pub async fn top_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query.limit.unwrap_or(20);
    if !(1..=100).contains(&limit) {
        return Err(AppError::BadRequest(
            "limit must be between 1 and 100".to_string(),
        ));
    }
    let questions = state
        .analytics
        .top_questions(limit)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": questions })))
}

/// `GET /api/stats/top-users` — most active users, top 10 by default.
pub async fn top_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query.limit.unwrap_or(10);
    if !(1..=100).contains(&limit) {
        return Err(AppError::BadRequest(
            "limit must be between 1 and 100".to_string(),
        ));
    }
    let users = state
        .analytics
        .top_users(limit)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": users })))
}

#[derive(Debug, Deserialize)]
pub struct RetentionQueryParams {
    pub days: Option<u32>,
}

/// `GET /api/stats/retention?days=N` — daily cohorts with ever-returned
/// retention cells out to N offsets (default 14, clamped to 30 by the
/// store).
pub async fn retention(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RetentionQueryParams>,
) -> Result<impl IntoResponse, AppError> {
    let response = state
        .analytics
        .retention(query.days.unwrap_or(14))
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": response })))
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<i64>,
}

/// `GET /api/stats/feedback-trend?days=N` — daily positive/negative counts,
/// last 30 days by default.
pub async fn feedback_trend(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .analytics
        .feedback_over_time(query.days.unwrap_or(30))
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": rows })))
}
