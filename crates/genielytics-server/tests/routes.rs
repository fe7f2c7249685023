//! Router-level tests over an in-memory mock store.
//!
//! The handlers only ever see `Arc<dyn AnalyticsStore>`, so the mock swaps
//! in without touching any route code; requests go through the real router
//! via `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tower::util::ServiceExt;

use genielytics_core::analytics::{
    AnalyticsStore, ConversationMetricsRow, ConversationStats, ConversationSummary,
    CreateFavoriteRequest, DailyActivityRow, EngagementSummary, EventQuery, Favorite,
    FeedbackTrendRow, HourlyActivityRow, NpsSummary, QuestionCount, RetentionResponse,
    SessionRollup, SessionUpdate, UpdateFavoriteRequest, UserActivityRow, VisitorBucket,
    VisitorPeriod,
};
use genielytics_core::config::{Config, CredentialSource, DatabaseConfig};
use genielytics_core::event::{Event, NewEvent};
use genielytics_server::{app::build_app, state::AppState};

#[derive(Default)]
struct MockStore {
    appended: Mutex<Vec<NewEvent>>,
    session_updates: Mutex<Vec<SessionUpdate>>,
    session: Option<SessionRollup>,
}

#[async_trait::async_trait]
impl AnalyticsStore for MockStore {
    async fn append_events(&self, events: &[NewEvent]) -> anyhow::Result<Vec<i64>> {
        let mut appended = self.appended.lock().await;
        let base = appended.len() as i64;
        appended.extend_from_slice(events);
        Ok((1..=events.len() as i64).map(|n| base + n).collect())
    }

    async fn list_events(&self, _query: &EventQuery) -> anyhow::Result<Vec<Event>> {
        Ok(Vec::new())
    }

    async fn upsert_session(&self, update: &SessionUpdate) -> anyhow::Result<()> {
        self.session_updates.lock().await.push(update.clone());
        Ok(())
    }

    async fn get_session(&self, _session_id: &str) -> anyhow::Result<Option<SessionRollup>> {
        Ok(self.session.clone())
    }

    async fn reconcile_session(
        &self,
        _session_id: &str,
    ) -> anyhow::Result<Option<SessionRollup>> {
        Ok(self.session.clone())
    }

    async fn daily_activity(&self) -> anyhow::Result<Vec<DailyActivityRow>> {
        Ok(Vec::new())
    }

    async fn conversation_metrics(&self) -> anyhow::Result<Vec<ConversationMetricsRow>> {
        Ok(Vec::new())
    }

    async fn user_conversations(
        &self,
        _user_id: &str,
        _limit: i64,
    ) -> anyhow::Result<Vec<ConversationSummary>> {
        Ok(Vec::new())
    }

    async fn nps(&self) -> anyhow::Result<NpsSummary> {
        Ok(NpsSummary::from_counts(0, 0))
    }

    async fn engagement(&self) -> anyhow::Result<EngagementSummary> {
        Ok(EngagementSummary {
            total_users: 0,
            total_conversations: 0,
            total_messages: 0,
            total_feedback: 0,
            avg_messages_per_conversation: 0.0,
        })
    }

    async fn conversation_stats(&self) -> anyhow::Result<ConversationStats> {
        Ok(ConversationStats {
            total_conversations: 0,
            avg_messages_per_conversation: 0.0,
            median_messages: 0.0,
            conversations_with_feedback: 0,
            feedback_rate: 0.0,
        })
    }

    async fn unique_visitors(
        &self,
        _period: VisitorPeriod,
    ) -> anyhow::Result<Vec<VisitorBucket>> {
        Ok(Vec::new())
    }

    async fn activity_by_hour(&self) -> anyhow::Result<Vec<HourlyActivityRow>> {
        Ok(Vec::new())
    }

    async fn retention(&self, max_offsets: u32) -> anyhow::Result<RetentionResponse> {
        Ok(RetentionResponse {
            max_offsets,
            rows: Vec::new(),
        })
    }

    async fn top_questions(&self, _limit: i64) -> anyhow::Result<Vec<QuestionCount>> {
        Ok(Vec::new())
    }

    async fn top_users(&self, _limit: i64) -> anyhow::Result<Vec<UserActivityRow>> {
        Ok(Vec::new())
    }

    async fn feedback_over_time(&self, _days: i64) -> anyhow::Result<Vec<FeedbackTrendRow>> {
        Ok(Vec::new())
    }

    async fn create_favorite(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        req: &CreateFavoriteRequest,
    ) -> anyhow::Result<Favorite> {
        Ok(Favorite {
            id: 1,
            user_id: user_id.to_string(),
            user_email: user_email.map(str::to_string),
            question: req.question.clone(),
            sql_query: req.sql_query.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn list_favorites(&self, _user_id: &str) -> anyhow::Result<Vec<Favorite>> {
        Ok(Vec::new())
    }

    async fn update_favorite(
        &self,
        _id: i64,
        _user_id: &str,
        _req: &UpdateFavoriteRequest,
    ) -> anyhow::Result<Option<Favorite>> {
        Ok(None)
    }

    async fn delete_favorite(&self, _id: i64, _user_id: &str) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn test_config() -> Config {
    Config {
        port: 3000,
        database: DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "genielytics_test".to_string(),
            user: "tester".to_string(),
            credential: CredentialSource::Token("test-token".to_string()),
        },
        timezone: "UTC".parse().unwrap(),
        refresh_secs: 60,
    }
}

fn app_with(store: Arc<MockStore>) -> axum::Router {
    build_app(Arc::new(AppState::new(store, test_config())))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn record_event_resolves_identity_and_assigns_session() {
    let store = Arc::new(MockStore::default());
    let app = app_with(store.clone());

    let response = app
        .oneshot(
            Request::post("/api/events")
                .header("content-type", "application/json")
                .header("x-forwarded-user", "jane@example.com")
                .body(Body::from(r#"{"type": "page_visit"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["event_ids"].as_array().unwrap().len(), 1);
    let session_id = body["session_ids"][0].as_str().unwrap();
    assert!(!session_id.is_empty(), "server generates a session id");

    let appended = store.appended.lock().await;
    assert_eq!(appended.len(), 1);
    assert_eq!(appended[0].user_id, "jane@example.com");
    assert_eq!(appended[0].session_id.as_deref(), Some(session_id));

    // The paired rollup write happened too.
    let updates = store.session_updates.lock().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].session_id, session_id);
}

#[tokio::test]
async fn record_rejects_feedback_without_feedback_type() {
    let app = app_with(Arc::new(MockStore::default()));

    let response = app
        .oneshot(
            Request::post("/api/events")
                .header("content-type", "application/json")
                .header("x-forwarded-user", "jane@example.com")
                .body(Body::from(
                    r#"{"type": "feedback", "conversation_id": "c1", "message_id": "m1"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn record_rejects_comment_outside_feedback() {
    let app = app_with(Arc::new(MockStore::default()));

    let response = app
        .oneshot(
            Request::post("/api/events")
                .header("content-type", "application/json")
                .header("x-forwarded-user", "jane@example.com")
                .body(Body::from(
                    r#"{"type": "send_message", "comment": "should not be here"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn record_without_identity_is_rejected() {
    let store = Arc::new(MockStore::default());
    let app = app_with(store.clone());

    let response = app
        .oneshot(
            Request::post("/api/events")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"type": "page_visit"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.appended.lock().await.is_empty());
}

#[tokio::test]
async fn record_accepts_payload_identity_as_dev_fallback() {
    let store = Arc::new(MockStore::default());
    let app = app_with(store.clone());

    let response = app
        .oneshot(
            Request::post("/api/events")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"type": "page_visit", "user_id": "dev@local", "session_id": "s-dev"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let appended = store.appended.lock().await;
    assert_eq!(appended[0].user_id, "dev@local");
    assert_eq!(appended[0].session_id.as_deref(), Some("s-dev"));
}

#[tokio::test]
async fn record_rejects_oversized_batch() {
    let app = app_with(Arc::new(MockStore::default()));

    let batch: Vec<serde_json::Value> = (0..51)
        .map(|_| serde_json::json!({"type": "page_visit"}))
        .collect();
    let response = app
        .oneshot(
            Request::post("/api/events")
                .header("content-type", "application/json")
                .header("x-forwarded-user", "jane@example.com")
                .body(Body::from(serde_json::to_string(&batch).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "batch_too_large");
}

#[tokio::test]
async fn nps_serializes_null_score_when_no_feedback() {
    let app = app_with(Arc::new(MockStore::default()));

    let response = app
        .oneshot(Request::get("/api/stats/nps").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"]["score"].is_null());
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn session_lookup_is_404_when_absent_and_200_when_present() {
    let app = app_with(Arc::new(MockStore::default()));
    let response = app
        .oneshot(
            Request::get("/api/sessions/sess-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let store = Arc::new(MockStore {
        session: Some(SessionRollup {
            session_id: "sess-1".to_string(),
            user_id: "jane@example.com".to_string(),
            user_email: None,
            user_name: None,
            first_visit: Utc::now(),
            last_activity: Utc::now(),
            total_conversations: 2,
            total_messages: 5,
            total_positive_feedback: 1,
            total_negative_feedback: 0,
        }),
        ..MockStore::default()
    });
    let app = app_with(store);
    let response = app
        .oneshot(
            Request::get("/api/sessions/sess-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total_messages"], 5);
}

#[tokio::test]
async fn visitors_rejects_unknown_period() {
    let app = app_with(Arc::new(MockStore::default()));
    let response = app
        .oneshot(
            Request::get("/api/stats/visitors?period=hourly")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn favorite_delete_of_foreign_row_is_404() {
    let app = app_with(Arc::new(MockStore::default()));
    let response = app
        .oneshot(
            Request::delete("/api/favorites/7")
                .header("x-forwarded-user", "jane@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorite_create_requires_non_empty_fields() {
    let app = app_with(Arc::new(MockStore::default()));
    let response = app
        .oneshot(
            Request::post("/api/favorites")
                .header("content-type", "application/json")
                .header("x-forwarded-user", "jane@example.com")
                .body(Body::from(r#"{"question": " ", "sql_query": "SELECT 1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = app_with(Arc::new(MockStore::default()));
    let response = app
        .oneshot(
            Request::post("/api/favorites")
                .header("content-type", "application/json")
                .header("x-forwarded-user", "jane@example.com")
                .body(Body::from(
                    r#"{"question": "Top products", "sql_query": "SELECT 1"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["user_id"], "jane@example.com");
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app_with(Arc::new(MockStore::default()));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}
