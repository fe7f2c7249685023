use anyhow::Result;
use sqlx::Row;

use genielytics_core::analytics::{QuestionCount, UserActivityRow};

use crate::PgBackend;

/// Most-asked questions: send_message events grouped by the normalized
/// question text from metadata. Events without a usable question (absent
/// metadata, absent key, blank text) are skipped, not errors.
///
/// Ordering is count descending with the normalized question ascending as
/// the tie-break, so equal counts always come back in the same order.
pub(crate) async fn top_questions_inner(db: &PgBackend, limit: i64) -> Result<Vec<QuestionCount>> {
    let pool = db.pool().await;
    let rows = sqlx::query(
        "SELECT lower(btrim(metadata->>'question')) AS question, COUNT(*) AS count \
         FROM user_events \
         WHERE event_type = 'send_message' \
           AND metadata->>'question' IS NOT NULL \
           AND btrim(metadata->>'question') <> '' \
         GROUP BY 1 \
         ORDER BY count DESC, question ASC \
         LIMIT $1",
    )
    .bind(limit.clamp(1, 100))
    .fetch_all(&pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(QuestionCount {
                question: row.try_get("question")?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

/// Most active users over conversation/message/feedback events. Tie-break on
/// equal totals is user_id ascending.
pub(crate) async fn top_users_inner(db: &PgBackend, limit: i64) -> Result<Vec<UserActivityRow>> {
    let pool = db.pool().await;
    let rows = sqlx::query(
        "SELECT \
            user_id, \
            MAX(user_email) AS user_email, \
            COUNT(*) FILTER (WHERE event_type = 'start_conversation') AS conversations, \
            COUNT(*) FILTER (WHERE event_type = 'send_message') AS messages, \
            COUNT(*) FILTER (WHERE event_type = 'feedback' AND feedback_type = 'positive') AS positive_feedback, \
            COUNT(*) FILTER (WHERE event_type = 'feedback' AND feedback_type = 'negative') AS negative_feedback, \
            COUNT(*) AS total_activity \
         FROM user_events \
         WHERE event_type IN ('start_conversation', 'send_message', 'feedback') \
         GROUP BY user_id \
         ORDER BY total_activity DESC, user_id ASC \
         LIMIT $1",
    )
    .bind(limit.clamp(1, 100))
    .fetch_all(&pool)
    .await?;

    rows.iter()
        .map(|row| {
            let user_id: String = row.try_get("user_id")?;
            let user_email: Option<String> = row.try_get("user_email")?;
            Ok(UserActivityRow {
                user_email: user_email.unwrap_or_else(|| user_id.clone()),
                user_id,
                conversations: row.try_get("conversations")?,
                messages: row.try_get("messages")?,
                positive_feedback: row.try_get("positive_feedback")?,
                negative_feedback: row.try_get("negative_feedback")?,
                total_activity: row.try_get("total_activity")?,
            })
        })
        .collect()
}

impl PgBackend {
    pub async fn top_questions(&self, limit: i64) -> Result<Vec<QuestionCount>> {
        top_questions_inner(self, limit).await
    }

    pub async fn top_users(&self, limit: i64) -> Result<Vec<UserActivityRow>> {
        top_users_inner(self, limit).await
    }
}
