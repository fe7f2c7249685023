use async_trait::async_trait;

use genielytics_core::analytics::{
    AnalyticsStore, ConversationMetricsRow, ConversationStats, ConversationSummary,
    CreateFavoriteRequest, DailyActivityRow, EngagementSummary, EventQuery, Favorite,
    FeedbackTrendRow, HourlyActivityRow, NpsSummary, QuestionCount, RetentionResponse,
    SessionRollup, SessionUpdate, UpdateFavoriteRequest, UserActivityRow, VisitorBucket,
    VisitorPeriod,
};
use genielytics_core::event::{Event, NewEvent};

use crate::PgBackend;

#[async_trait]
impl AnalyticsStore for PgBackend {
    async fn append_events(&self, events: &[NewEvent]) -> anyhow::Result<Vec<i64>> {
        PgBackend::append_events(self, events).await
    }

    async fn list_events(&self, query: &EventQuery) -> anyhow::Result<Vec<Event>> {
        PgBackend::list_events(self, query).await
    }

    async fn upsert_session(&self, update: &SessionUpdate) -> anyhow::Result<()> {
        PgBackend::upsert_session(self, update).await
    }

    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<SessionRollup>> {
        PgBackend::get_session(self, session_id).await
    }

    async fn reconcile_session(&self, session_id: &str) -> anyhow::Result<Option<SessionRollup>> {
        PgBackend::reconcile_session(self, session_id).await
    }

    async fn daily_activity(&self) -> anyhow::Result<Vec<DailyActivityRow>> {
        PgBackend::daily_activity(self).await
    }

    async fn conversation_metrics(&self) -> anyhow::Result<Vec<ConversationMetricsRow>> {
        PgBackend::conversation_metrics(self).await
    }

    async fn user_conversations(
        &self,
        user_id: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<ConversationSummary>> {
        PgBackend::user_conversations(self, user_id, limit).await
    }

    async fn nps(&self) -> anyhow::Result<NpsSummary> {
        PgBackend::nps(self).await
    }

    async fn engagement(&self) -> anyhow::Result<EngagementSummary> {
        PgBackend::engagement(self).await
    }

    async fn conversation_stats(&self) -> anyhow::Result<ConversationStats> {
        PgBackend::conversation_stats(self).await
    }

    async fn unique_visitors(
        &self,
        period: VisitorPeriod,
    ) -> anyhow::Result<Vec<VisitorBucket>> {
        PgBackend::unique_visitors(self, period).await
    }

    async fn activity_by_hour(&self) -> anyhow::Result<Vec<HourlyActivityRow>> {
        PgBackend::activity_by_hour(self).await
    }

    async fn retention(&self, max_offsets: u32) -> anyhow::Result<RetentionResponse> {
        PgBackend::retention(self, max_offsets).await
    }

    async fn top_questions(&self, limit: i64) -> anyhow::Result<Vec<QuestionCount>> {
        PgBackend::top_questions(self, limit).await
    }

    async fn top_users(&self, limit: i64) -> anyhow::Result<Vec<UserActivityRow>> {
        PgBackend::top_users(self, limit).await
    }

    async fn feedback_over_time(&self, days: i64) -> anyhow::Result<Vec<FeedbackTrendRow>> {
        PgBackend::feedback_over_time(self, days).await
    }

    async fn create_favorite(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        req: &CreateFavoriteRequest,
    ) -> anyhow::Result<Favorite> {
        PgBackend::create_favorite(self, user_id, user_email, req).await
    }

    async fn list_favorites(&self, user_id: &str) -> anyhow::Result<Vec<Favorite>> {
        PgBackend::list_favorites(self, user_id).await
    }

    async fn update_favorite(
        &self,
        id: i64,
        user_id: &str,
        req: &UpdateFavoriteRequest,
    ) -> anyhow::Result<Option<Favorite>> {
        PgBackend::update_favorite(self, id, user_id, req).await
    }

    async fn delete_favorite(&self, id: i64, user_id: &str) -> anyhow::Result<bool> {
        PgBackend::delete_favorite(self, id, user_id).await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        PgBackend::ping(self).await
    }
}
