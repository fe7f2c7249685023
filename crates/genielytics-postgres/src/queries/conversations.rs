use anyhow::Result;
use sqlx::Row;

use genielytics_core::analytics::{
    ConversationMetricsRow, ConversationStats, ConversationSummary, EngagementSummary,
    FeedbackStatus,
};

use crate::PgBackend;

/// Read the `conversation_metrics` view (ordered newest started_at first by
/// the view itself).
pub(crate) async fn conversation_metrics_inner(
    db: &PgBackend,
) -> Result<Vec<ConversationMetricsRow>> {
    let pool = db.pool().await;
    let rows = sqlx::query(
        "SELECT conversation_id, user_id, started_at, message_count, \
                positive_feedback, negative_feedback, feedback_status \
         FROM conversation_metrics",
    )
    .fetch_all(&pool)
    .await?;

    rows.iter()
        .map(|row| {
            let status: String = row.try_get("feedback_status")?;
            Ok(ConversationMetricsRow {
                conversation_id: row.try_get("conversation_id")?,
                user_id: row.try_get("user_id")?,
                started_at: row.try_get("started_at")?,
                message_count: row.try_get("message_count")?,
                positive_feedback: row.try_get("positive_feedback")?,
                negative_feedback: row.try_get("negative_feedback")?,
                feedback_status: FeedbackStatus::parse(&status)?,
            })
        })
        .collect()
}

/// A user's conversation history for the chat sidebar: started_at is the
/// first start_conversation event, first_question comes from its metadata
/// (absent metadata just yields no title, never an error).
pub(crate) async fn user_conversations_inner(
    db: &PgBackend,
    user_id: &str,
    limit: i64,
) -> Result<Vec<ConversationSummary>> {
    let pool = db.pool().await;
    let rows = sqlx::query(
        r#"WITH conversation_summary AS (
            SELECT
                conversation_id,
                MIN(timestamp) FILTER (WHERE event_type = 'start_conversation') AS started_at,
                MAX(timestamp) AS last_activity,
                COUNT(*) FILTER (WHERE event_type = 'send_message') AS message_count,
                MAX(metadata->>'question') FILTER (WHERE event_type = 'start_conversation') AS first_question
            FROM user_events
            WHERE user_id = $1
              AND conversation_id IS NOT NULL
              AND event_type IN ('start_conversation', 'send_message')
            GROUP BY conversation_id
        )
        SELECT conversation_id, started_at, last_activity, message_count, first_question
        FROM conversation_summary
        ORDER BY last_activity DESC
        LIMIT $2"#,
    )
    .bind(user_id)
    .bind(limit.max(1))
    .fetch_all(&pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ConversationSummary {
                conversation_id: row.try_get("conversation_id")?,
                started_at: row.try_get("started_at")?,
                last_activity: row.try_get("last_activity")?,
                message_count: row.try_get("message_count")?,
                first_question: row.try_get("first_question")?,
            })
        })
        .collect()
}

/// Headline totals for the dashboard summary cards.
pub(crate) async fn engagement_inner(db: &PgBackend) -> Result<EngagementSummary> {
    let pool = db.pool().await;
    let row = sqlx::query(
        "SELECT \
            COUNT(DISTINCT user_id) FILTER (WHERE event_type = 'page_visit') AS total_users, \
            COUNT(*) FILTER (WHERE event_type = 'start_conversation') AS total_conversations, \
            COUNT(*) FILTER (WHERE event_type = 'send_message') AS total_messages, \
            COUNT(*) FILTER (WHERE event_type = 'feedback') AS total_feedback \
         FROM user_events",
    )
    .fetch_one(&pool)
    .await?;

    let total_conversations: i64 = row.try_get("total_conversations")?;
    let total_messages: i64 = row.try_get("total_messages")?;
    let avg = total_messages as f64 / total_conversations.max(1) as f64;

    Ok(EngagementSummary {
        total_users: row.try_get("total_users")?,
        total_conversations,
        total_messages,
        total_feedback: row.try_get("total_feedback")?,
        avg_messages_per_conversation: (avg * 100.0).round() / 100.0,
    })
}

/// Conversation-level aggregates: average and median message volume plus the
/// share of conversations that received any feedback.
pub(crate) async fn conversation_stats_inner(db: &PgBackend) -> Result<ConversationStats> {
    let pool = db.pool().await;
    let row = sqlx::query(
        r#"WITH conversation_stats AS (
            SELECT
                conversation_id,
                COUNT(*) FILTER (WHERE event_type = 'send_message') AS message_count,
                COUNT(*) FILTER (WHERE event_type = 'feedback') AS feedback_count
            FROM user_events
            WHERE conversation_id IS NOT NULL
            GROUP BY conversation_id
        )
        SELECT
            COUNT(*) AS total_conversations,
            COALESCE(CAST(AVG(message_count) AS DOUBLE PRECISION), 0) AS avg_messages,
            COUNT(*) FILTER (WHERE feedback_count > 0) AS with_feedback,
            COALESCE(
                CAST(PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY message_count) AS DOUBLE PRECISION),
                0
            ) AS median_messages
        FROM conversation_stats"#,
    )
    .fetch_one(&pool)
    .await?;

    let total: i64 = row.try_get("total_conversations")?;
    let with_feedback: i64 = row.try_get("with_feedback")?;
    let avg: f64 = row.try_get("avg_messages")?;
    let feedback_rate = if total > 0 {
        (with_feedback as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(ConversationStats {
        total_conversations: total,
        avg_messages_per_conversation: (avg * 100.0).round() / 100.0,
        median_messages: row.try_get("median_messages")?,
        conversations_with_feedback: with_feedback,
        feedback_rate,
    })
}

impl PgBackend {
    pub async fn conversation_metrics(&self) -> Result<Vec<ConversationMetricsRow>> {
        conversation_metrics_inner(self).await
    }

    pub async fn user_conversations(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ConversationSummary>> {
        user_conversations_inner(self, user_id, limit).await
    }

    pub async fn engagement(&self) -> Result<EngagementSummary> {
        engagement_inner(self).await
    }

    pub async fn conversation_stats(&self) -> Result<ConversationStats> {
        conversation_stats_inner(self).await
    }
}
