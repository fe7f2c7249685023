//! Analytics store abstraction.
//!
//! Result types for every dashboard query, the write-path records, and the
//! [`AnalyticsStore`] trait the server talks to. The PostgreSQL
//! implementation lives in `genielytics-postgres`; tests substitute an
//! in-memory mock behind the same trait.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventType, FeedbackKind, NewEvent};

/// Filters for reading raw events back out of the log.
///
/// All dimensions are optional and combine with AND; results are newest
/// first, capped at `limit`.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub conversation_id: Option<String>,
    pub session_id: Option<String>,
    pub limit: i64,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            user_id: None,
            conversation_id: None,
            session_id: None,
            limit: 100,
        }
    }
}

/// One row of `user_sessions` — the per-session rollup.
///
/// The rollup is a convenience cache maintained by paired writes, not the
/// source of truth; `reconcile_session` rebuilds any row from the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRollup {
    pub session_id: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub first_visit: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub total_conversations: i64,
    pub total_messages: i64,
    pub total_positive_feedback: i64,
    pub total_negative_feedback: i64,
}

/// The increment a single event contributes to its session rollup.
///
/// Computed in Rust so the upsert can stay one atomic
/// `INSERT ... ON CONFLICT DO UPDATE` statement with plain bind parameters.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub session_id: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub conversations: i64,
    pub messages: i64,
    pub positive_feedback: i64,
    pub negative_feedback: i64,
}

impl SessionUpdate {
    /// Derive the rollup increment for `event`, or `None` when the event
    /// carries no session_id (nothing to roll up).
    pub fn from_event(event: &NewEvent) -> Option<Self> {
        let session_id = event.session_id.clone()?;
        let mut update = Self {
            session_id,
            user_id: event.user_id.clone(),
            user_email: event.user_email.clone(),
            user_name: event.user_name.clone(),
            timestamp: event.timestamp,
            conversations: 0,
            messages: 0,
            positive_feedback: 0,
            negative_feedback: 0,
        };
        match event.event_type {
            EventType::StartConversation => update.conversations = 1,
            EventType::SendMessage => update.messages = 1,
            EventType::Feedback => match event.feedback_type {
                Some(FeedbackKind::Positive) => update.positive_feedback = 1,
                Some(FeedbackKind::Negative) => update.negative_feedback = 1,
                // Unvalidated feedback without a kind counts toward neither.
                None => {}
            },
            EventType::PageVisit | EventType::SqlResponse => {}
        }
        Some(update)
    }
}

/// One row of the `daily_user_activity` view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyActivityRow {
    pub activity_date: NaiveDate,
    pub user_id: String,
    pub user_email: Option<String>,
    pub page_visits: i64,
    pub conversations_started: i64,
    pub messages_sent: i64,
    pub sql_responses: i64,
    pub feedback_given: i64,
}

/// Whether a conversation has received at least one feedback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Rated,
    Unrated,
}

impl FeedbackStatus {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "rated" => Ok(Self::Rated),
            "unrated" => Ok(Self::Unrated),
            other => Err(anyhow!("unknown feedback_status: {other}")),
        }
    }
}

/// One row of the `conversation_metrics` view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMetricsRow {
    pub conversation_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub message_count: i64,
    pub positive_feedback: i64,
    pub negative_feedback: i64,
    pub feedback_status: FeedbackStatus,
}

/// Net Promoter Score over all feedback events.
///
/// `score` is `None` (serialized as JSON null) when no feedback exists yet —
/// the dashboard renders a placeholder instead of a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpsSummary {
    pub score: Option<f64>,
    pub promoters: i64,
    pub detractors: i64,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoter_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detractor_percentage: Option<f64>,
}

impl NpsSummary {
    /// score = (promoters − detractors) / total × 100, rounded to one
    /// decimal. Zero feedback is a defined state, never a division.
    pub fn from_counts(promoters: i64, detractors: i64) -> Self {
        let total = promoters + detractors;
        if total == 0 {
            return Self {
                score: None,
                promoters: 0,
                detractors: 0,
                total: 0,
                promoter_percentage: None,
                detractor_percentage: None,
            };
        }
        let pct = |n: i64| ((n as f64 / total as f64) * 1000.0).round() / 10.0;
        Self {
            score: Some(pct(promoters) - pct(detractors)),
            promoters,
            detractors,
            total,
            promoter_percentage: Some(pct(promoters)),
            detractor_percentage: Some(pct(detractors)),
        }
    }
}

/// Headline totals for the dashboard summary cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub total_users: i64,
    pub total_conversations: i64,
    pub total_messages: i64,
    pub total_feedback: i64,
    pub avg_messages_per_conversation: f64,
}

/// Conversation-level aggregate metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_conversations: i64,
    pub avg_messages_per_conversation: f64,
    pub median_messages: f64,
    pub conversations_with_feedback: i64,
    pub feedback_rate: f64,
}

/// Bucketing granularity for the unique-visitors series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisitorPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl VisitorPeriod {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some("daily") => Ok(Self::Daily),
            Some("weekly") => Ok(Self::Weekly),
            Some("monthly") => Ok(Self::Monthly),
            Some("quarterly") => Ok(Self::Quarterly),
            Some(_) => Err(anyhow!(
                "period must be one of: daily, weekly, monthly, quarterly"
            )),
        }
    }
}

/// One point of the unique-visitors series; `bucket` is the period start
/// date as `YYYY-MM-DD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorBucket {
    pub bucket: String,
    pub unique_visitors: i64,
}

/// Event volume for one hour of the day (0–23), summed across all dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyActivityRow {
    pub hour: u32,
    pub count: i64,
}

/// Retained users for one offset from a cohort's start date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPeriod {
    pub offset: u32,
    pub retained: i64,
    pub rate: f64,
}

/// One cohort (users whose first event fell on `cohort_date`) and its
/// retention cells, zero-filled out to the requested offset window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionCohortRow {
    pub cohort_date: String,
    pub cohort_size: i64,
    pub periods: Vec<RetentionPeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionResponse {
    pub max_offsets: u32,
    pub rows: Vec<RetentionCohortRow>,
}

/// One ranked question with its ask count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCount {
    pub question: String,
    pub count: i64,
}

/// Per-user activity totals for the most-active-users table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivityRow {
    pub user_id: String,
    pub user_email: String,
    pub conversations: i64,
    pub messages: i64,
    pub positive_feedback: i64,
    pub negative_feedback: i64,
    pub total_activity: i64,
}

/// Positive/negative feedback counts for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackTrendRow {
    pub date: NaiveDate,
    pub positive: i64,
    pub negative: i64,
}

/// One conversation in a user's history sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub message_count: i64,
    pub first_question: Option<String>,
}

/// A saved question/query pair — mirrors `user_favorites` exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: i64,
    pub user_id: String,
    pub user_email: Option<String>,
    pub question: String,
    pub sql_query: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFavoriteRequest {
    pub question: String,
    pub sql_query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFavoriteRequest {
    pub question: Option<String>,
    pub sql_query: Option<String>,
}

#[async_trait::async_trait]
pub trait AnalyticsStore: Send + Sync + 'static {
    /// Append events in order, all-or-nothing, returning the ids the
    /// database assigned. Appends never block each other across sessions.
    async fn append_events(&self, events: &[NewEvent]) -> Result<Vec<i64>>;

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>>;

    /// Apply one event's increment to its session rollup. A single atomic
    /// insert-or-update so concurrent requests for the same session_id
    /// serialize inside the database.
    async fn upsert_session(&self, update: &SessionUpdate) -> Result<()>;

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRollup>>;

    /// Recompute a session's counters from the event log and rewrite the
    /// rollup row. Returns the reconciled row, or `None` when no events
    /// exist for the session.
    async fn reconcile_session(&self, session_id: &str) -> Result<Option<SessionRollup>>;

    async fn daily_activity(&self) -> Result<Vec<DailyActivityRow>>;

    async fn conversation_metrics(&self) -> Result<Vec<ConversationMetricsRow>>;

    async fn user_conversations(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ConversationSummary>>;

    async fn nps(&self) -> Result<NpsSummary>;

    async fn engagement(&self) -> Result<EngagementSummary>;

    async fn conversation_stats(&self) -> Result<ConversationStats>;

    async fn unique_visitors(&self, period: VisitorPeriod) -> Result<Vec<VisitorBucket>>;

    async fn activity_by_hour(&self) -> Result<Vec<HourlyActivityRow>>;

    async fn retention(&self, max_offsets: u32) -> Result<RetentionResponse>;

    async fn top_questions(&self, limit: i64) -> Result<Vec<QuestionCount>>;

    async fn top_users(&self, limit: i64) -> Result<Vec<UserActivityRow>>;

    async fn feedback_over_time(&self, days: i64) -> Result<Vec<FeedbackTrendRow>>;

    async fn create_favorite(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        req: &CreateFavoriteRequest,
    ) -> Result<Favorite>;

    async fn list_favorites(&self, user_id: &str) -> Result<Vec<Favorite>>;

    async fn update_favorite(
        &self,
        id: i64,
        user_id: &str,
        req: &UpdateFavoriteRequest,
    ) -> Result<Option<Favorite>>;

    /// Returns `true` when a row was deleted, `false` when no favorite with
    /// that id belongs to the user.
    async fn delete_favorite(&self, id: i64, user_id: &str) -> Result<bool>;

    /// `SELECT 1` liveness check for the `/health` endpoint.
    async fn ping(&self) -> Result<()>;
}
