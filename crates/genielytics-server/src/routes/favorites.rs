use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use genielytics_core::analytics::{CreateFavoriteRequest, UpdateFavoriteRequest};

use crate::{error::AppError, identity, state::AppState};

#[derive(Debug, Deserialize)]
pub struct FavoritesQuery {
    /// Local-development fallback; forwarded headers win when present.
    pub user_id: Option<String>,
}

fn require_user(headers: &HeaderMap, query: &FavoritesQuery) -> Result<identity::UserIdentity, AppError> {
    identity::resolve(headers, query.user_id.as_deref()).ok_or_else(|| {
        AppError::BadRequest(
            "no user identity: X-Forwarded-User header or user_id required".to_string(),
        )
    })
}

/// `POST /api/favorites` — save a question/query pair for the acting user.
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FavoritesQuery>,
    Json(req): Json<CreateFavoriteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&headers, &query)?;
    if req.question.trim().is_empty() || req.sql_query.trim().is_empty() {
        return Err(AppError::BadRequest(
            "question and sql_query must not be empty".to_string(),
        ));
    }

    let favorite = state
        .analytics
        .create_favorite(&user.user_id, user.user_email.as_deref(), &req)
        .await
        .map_err(AppError::Internal)?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({ "data": favorite })),
    ))
}

/// `GET /api/favorites` — the acting user's favorites, newest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FavoritesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&headers, &query)?;
    let favorites = state
        .analytics
        .list_favorites(&user.user_id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({ "data": favorites })))
}

/// `PUT /api/favorites/{id}` — edit; ownership enforced by the store.
pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<FavoritesQuery>,
    Json(req): Json<UpdateFavoriteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&headers, &query)?;
    let favorite = state
        .analytics
        .update_favorite(id, &user.user_id, &req)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Favorite not found".to_string()))?;

    Ok(Json(json!({ "data": favorite })))
}

/// `DELETE /api/favorites/{id}` — remove; 404 when the id does not exist or
/// belongs to someone else (indistinguishable on purpose).
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<FavoritesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&headers, &query)?;
    let deleted = state
        .analytics
        .delete_favorite(id, &user.user_id)
        .await
        .map_err(AppError::Internal)?;

    if !deleted {
        return Err(AppError::NotFound("Favorite not found".to_string()));
    }
    Ok(Json(json!({ "ok": true })))
}
