use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;

use genielytics_core::analytics::{SessionRollup, SessionUpdate};

use crate::PgBackend;

/// Apply one event's increment to its session rollup.
///
/// A single `INSERT ... ON CONFLICT DO UPDATE` so two requests racing on the
/// same session_id (a double-submitted thumbs click, two tabs) serialize
/// inside PostgreSQL instead of losing an update to read-then-write.
///
/// `first_visit` is written once and kept on conflict; `last_activity` is
/// set to the event's timestamp — not MAX-ed — so out-of-order delivery can
/// move it backward. That matches the recorded event stream and is accepted.
///
/// This write is the second half of a dual write (the event append is the
/// first). A crash between the two leaves the rollup behind the log;
/// `reconcile_session` recovers it, because the log is the source of truth.
pub(crate) async fn upsert_session_inner(db: &PgBackend, update: &SessionUpdate) -> Result<()> {
    let pool = db.pool().await;
    sqlx::query(
        r#"INSERT INTO user_sessions (
            session_id, user_id, user_email, user_name,
            first_visit, last_activity,
            total_conversations, total_messages,
            total_positive_feedback, total_negative_feedback
        ) VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $9)
        ON CONFLICT (session_id) DO UPDATE SET
            last_activity = EXCLUDED.last_activity,
            user_email = COALESCE(EXCLUDED.user_email, user_sessions.user_email),
            user_name  = COALESCE(EXCLUDED.user_name,  user_sessions.user_name),
            total_conversations     = user_sessions.total_conversations     + EXCLUDED.total_conversations,
            total_messages          = user_sessions.total_messages          + EXCLUDED.total_messages,
            total_positive_feedback = user_sessions.total_positive_feedback + EXCLUDED.total_positive_feedback,
            total_negative_feedback = user_sessions.total_negative_feedback + EXCLUDED.total_negative_feedback"#,
    )
    .bind(&update.session_id)
    .bind(&update.user_id)
    .bind(&update.user_email)
    .bind(&update.user_name)
    .bind(update.timestamp)
    .bind(update.conversations)
    .bind(update.messages)
    .bind(update.positive_feedback)
    .bind(update.negative_feedback)
    .execute(&pool)
    .await?;
    Ok(())
}

pub(crate) async fn get_session_inner(
    db: &PgBackend,
    session_id: &str,
) -> Result<Option<SessionRollup>> {
    let pool = db.pool().await;
    let row = sqlx::query(
        "SELECT session_id, user_id, user_email, user_name, first_visit, last_activity, \
                total_conversations, total_messages, \
                total_positive_feedback, total_negative_feedback \
         FROM user_sessions WHERE session_id = $1",
    )
    .bind(session_id)
    .fetch_optional(&pool)
    .await?;
    row.as_ref().map(rollup_from_row).transpose()
}

/// Rebuild a session's rollup from the event log in one statement.
///
/// Counters, `first_visit`, and `last_activity` are all recomputed from
/// `user_events` and overwrite whatever the paired writes left behind, so
/// after this call the row equals the per-type counts of the log exactly.
/// Returns the reconciled row, or `None` (row untouched) when the log holds
/// no events for the session.
pub(crate) async fn reconcile_session_inner(
    db: &PgBackend,
    session_id: &str,
) -> Result<Option<SessionRollup>> {
    let pool = db.pool().await;
    let result = sqlx::query(
        r#"INSERT INTO user_sessions (
            session_id, user_id, user_email, user_name,
            first_visit, last_activity,
            total_conversations, total_messages,
            total_positive_feedback, total_negative_feedback
        )
        SELECT
            $1,
            MAX(user_id),
            MAX(user_email),
            MAX(user_name),
            MIN(timestamp),
            MAX(timestamp),
            COUNT(*) FILTER (WHERE event_type = 'start_conversation'),
            COUNT(*) FILTER (WHERE event_type = 'send_message'),
            COUNT(*) FILTER (WHERE event_type = 'feedback' AND feedback_type = 'positive'),
            COUNT(*) FILTER (WHERE event_type = 'feedback' AND feedback_type = 'negative')
        FROM user_events
        WHERE session_id = $1
        HAVING COUNT(*) > 0
        ON CONFLICT (session_id) DO UPDATE SET
            user_id       = EXCLUDED.user_id,
            user_email    = COALESCE(EXCLUDED.user_email, user_sessions.user_email),
            user_name     = COALESCE(EXCLUDED.user_name,  user_sessions.user_name),
            first_visit   = EXCLUDED.first_visit,
            last_activity = EXCLUDED.last_activity,
            total_conversations     = EXCLUDED.total_conversations,
            total_messages          = EXCLUDED.total_messages,
            total_positive_feedback = EXCLUDED.total_positive_feedback,
            total_negative_feedback = EXCLUDED.total_negative_feedback"#,
    )
    .bind(session_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    tracing::debug!(session_id, "session rollup reconciled from event log");
    get_session_inner(db, session_id).await
}

fn rollup_from_row(row: &PgRow) -> Result<SessionRollup> {
    Ok(SessionRollup {
        session_id: row.try_get("session_id")?,
        user_id: row.try_get("user_id")?,
        user_email: row.try_get("user_email")?,
        user_name: row.try_get("user_name")?,
        first_visit: row.try_get("first_visit")?,
        last_activity: row.try_get("last_activity")?,
        total_conversations: row.try_get("total_conversations")?,
        total_messages: row.try_get("total_messages")?,
        total_positive_feedback: row.try_get("total_positive_feedback")?,
        total_negative_feedback: row.try_get("total_negative_feedback")?,
    })
}

impl PgBackend {
    pub async fn upsert_session(&self, update: &SessionUpdate) -> Result<()> {
        upsert_session_inner(self, update).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionRollup>> {
        get_session_inner(self, session_id).await
    }

    pub async fn reconcile_session(&self, session_id: &str) -> Result<Option<SessionRollup>> {
        reconcile_session_inner(self, session_id).await
    }
}
