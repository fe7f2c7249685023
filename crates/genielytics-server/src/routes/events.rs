use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use genielytics_core::{
    analytics::{EventQuery, SessionUpdate},
    event::{generate_session_id, NewEvent, RecordOrBatch, RecordPayload},
};

use crate::{error::AppError, identity, state::AppState};

/// `POST /api/events` — record a single event or a batch of up to 50.
///
/// ## Identity
/// Resolved from the proxy's forwarded headers; the payload's own user
/// fields are accepted as a local-development fallback. A request with no
/// resolvable user is rejected with 400.
///
/// ## Validation
/// `feedback_type` is required iff the event is feedback, and a comment only
/// travels with feedback (the log is append-only — there is no later UPDATE
/// to attach one). Metadata is accepted as-is, never inspected.
///
/// ## Sessions
/// Events without a session_id get a generated one; assigned ids come back
/// in the response so the client can keep using them. After the append
/// commits, each event's increment is applied to its session rollup. The two
/// writes are deliberately not one transaction — the rollup is a cache, and
/// POST /api/sessions/{id}/reconcile rebuilds it from the log.
///
/// ## Response
/// `202 Accepted` with `{ "ok": true, "event_ids": [...], "session_ids": [...] }`.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RecordOrBatch>,
) -> Result<impl IntoResponse, AppError> {
    // Normalise single event / batch into a uniform Vec.
    let payloads: Vec<RecordPayload> = match payload {
        RecordOrBatch::Single(p) => vec![*p],
        RecordOrBatch::Batch(v) => v,
    };

    if payloads.len() > 50 {
        return Err(AppError::BatchTooLarge(payloads.len()));
    }
    if payloads.is_empty() {
        return Err(AppError::BadRequest("empty batch".to_string()));
    }

    let client_ip = extract_client_ip(&headers);
    if !state.check_rate_limit(&client_ip).await {
        return Err(AppError::RateLimited);
    }

    let header_identity = identity::from_headers(&headers);
    let now = Utc::now();

    let mut events: Vec<NewEvent> = Vec::with_capacity(payloads.len());
    let mut session_ids: Vec<String> = Vec::with_capacity(payloads.len());

    for payload in payloads {
        let user = header_identity
            .clone()
            .or_else(|| identity::from_payload(&payload))
            .ok_or_else(|| {
                AppError::BadRequest(
                    "no user identity: X-Forwarded-User header or user_id required".to_string(),
                )
            })?;

        let session_id = payload
            .session_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(generate_session_id);

        let event = NewEvent {
            event_type: payload.event_type,
            user_id: user.user_id,
            user_email: user.user_email,
            user_name: user.user_name,
            conversation_id: payload.conversation_id,
            message_id: payload.message_id,
            feedback_type: payload.feedback_type,
            session_id: Some(session_id.clone()),
            metadata: payload.metadata,
            comment: payload.comment,
            timestamp: now,
        };
        event
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        session_ids.push(session_id);
        events.push(event);
    }

    let event_ids = state
        .analytics
        .append_events(&events)
        .await
        .map_err(AppError::Internal)?;

    // Paired rollup write. A failure here leaves the rollup behind the log;
    // log it and move on — reconciliation recovers, the append already
    // committed.
    for event in &events {
        if let Some(update) = SessionUpdate::from_event(event) {
            if let Err(e) = state.analytics.upsert_session(&update).await {
                tracing::warn!(
                    error = %e,
                    session_id = %update.session_id,
                    "session rollup update failed; reconcile will recover"
                );
            }
        }
    }

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(json!({
            "ok": true,
            "event_ids": event_ids,
            "session_ids": session_ids
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub conversation_id: Option<String>,
    pub session_id: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /api/events` — filtered fetch from the log, newest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query.limit.unwrap_or(100);
    if !(1..=1000).contains(&limit) {
        return Err(AppError::BadRequest(
            "limit must be between 1 and 1000".to_string(),
        ));
    }

    let events = state
        .analytics
        .list_events(&EventQuery {
            start: query.start,
            end: query.end,
            user_id: query.user_id,
            conversation_id: query.conversation_id,
            session_id: query.session_id,
            limit,
        })
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({ "data": events })))
}

/// Extract the real client IP from `X-Forwarded-For` (first entry).
///
/// Falls back to `"unknown"` when the header is absent — local requests then
/// share one rate-limit bucket, which is fine for development.
fn extract_client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
