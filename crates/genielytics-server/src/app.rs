use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer` — structured request/response logging via `tracing`.
/// 2. `CorsLayer` — permissive CORS; the chat UI and the stats dashboard are
///    served from different origins than this API.
///
/// Rate limiting (60 req/min per IP on `/api/events`) is enforced inside the
/// collect handler via `AppState::check_rate_limit`.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/events",
            post(routes::events::record).get(routes::events::list),
        )
        .route("/api/sessions/{id}", get(routes::sessions::get_session))
        .route(
            "/api/sessions/{id}/reconcile",
            post(routes::sessions::reconcile),
        )
        .route(
            "/api/favorites",
            post(routes::favorites::create).get(routes::favorites::list),
        )
        .route(
            "/api/favorites/{id}",
            put(routes::favorites::update).delete(routes::favorites::destroy),
        )
        .route("/api/activity/daily", get(routes::activity::daily))
        .route("/api/conversations", get(routes::conversations::for_user))
        .route(
            "/api/conversations/metrics",
            get(routes::conversations::metrics),
        )
        .route("/api/stats/engagement", get(routes::stats::engagement))
        .route("/api/stats/nps", get(routes::stats::nps))
        .route(
            "/api/stats/conversations",
            get(routes::conversations::stats),
        )
        .route("/api/stats/top-questions", get(routes::stats::top_questions))
        .route("/api/stats/top-users", get(routes::stats::top_users))
        .route(
            "/api/stats/hourly-activity",
            get(routes::activity::hourly),
        )
        .route("/api/stats/visitors", get(routes::activity::visitors))
        .route("/api/stats/retention", get(routes::stats::retention))
        .route(
            "/api/stats/feedback-trend",
            get(routes::stats::feedback_trend),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
