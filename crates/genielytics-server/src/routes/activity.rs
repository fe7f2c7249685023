use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use genielytics_core::analytics::VisitorPeriod;

use crate::{error::AppError, state::AppState};

/// `GET /api/activity/daily` — the daily_user_activity view, in its fixed
/// display order (newest date, then conversations started).
pub async fn daily(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .analytics
        .daily_activity()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/stats/hourly-activity` — conversation/message volume by hour
/// of day across all dates (average peak hour, not an absolute peak).
pub async fn hourly(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .analytics
        .activity_by_hour()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": rows })))
}

#[derive(Debug, Deserialize)]
pub struct VisitorsQuery {
    pub period: Option<String>,
}

/// `GET /api/stats/visitors?period=daily|weekly|monthly|quarterly`
pub async fn visitors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VisitorsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let period = VisitorPeriod::parse(query.period.as_deref())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let buckets = state
        .analytics
        .unique_visitors(period)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({ "period": period, "data": buckets })))
}
