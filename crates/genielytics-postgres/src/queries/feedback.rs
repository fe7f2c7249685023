use anyhow::Result;
use sqlx::Row;

use genielytics_core::analytics::{FeedbackTrendRow, NpsSummary};

use crate::PgBackend;

/// Promoter/detractor counts over all feedback events; the score arithmetic
/// (including the zero-feedback null) lives in [`NpsSummary::from_counts`].
pub(crate) async fn nps_inner(db: &PgBackend) -> Result<NpsSummary> {
    let pool = db.pool().await;
    let row = sqlx::query(
        "SELECT \
            COUNT(*) FILTER (WHERE feedback_type = 'positive') AS promoters, \
            COUNT(*) FILTER (WHERE feedback_type = 'negative') AS detractors \
         FROM user_events \
         WHERE event_type = 'feedback'",
    )
    .fetch_one(&pool)
    .await?;

    let promoters: i64 = row.try_get("promoters")?;
    let detractors: i64 = row.try_get("detractors")?;
    Ok(NpsSummary::from_counts(promoters, detractors))
}

/// Positive/negative feedback per calendar day over the last `days` days,
/// newest first. Days with no feedback produce no row (the dashboard fills
/// gaps client-side).
pub(crate) async fn feedback_over_time_inner(
    db: &PgBackend,
    days: i64,
) -> Result<Vec<FeedbackTrendRow>> {
    let pool = db.pool().await;
    let rows = sqlx::query(
        "SELECT DATE(timestamp) AS date, \
                COUNT(*) FILTER (WHERE feedback_type = 'positive') AS positive, \
                COUNT(*) FILTER (WHERE feedback_type = 'negative') AS negative \
         FROM user_events \
         WHERE event_type = 'feedback' \
           AND timestamp >= CURRENT_DATE - CAST($1 AS INTEGER) \
         GROUP BY 1 ORDER BY 1 DESC",
    )
    .bind(days.clamp(1, 365))
    .fetch_all(&pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(FeedbackTrendRow {
                date: row.try_get("date")?,
                positive: row.try_get("positive")?,
                negative: row.try_get("negative")?,
            })
        })
        .collect()
}

impl PgBackend {
    pub async fn nps(&self) -> Result<NpsSummary> {
        nps_inner(self).await
    }

    pub async fn feedback_over_time(&self, days: i64) -> Result<Vec<FeedbackTrendRow>> {
        feedback_over_time_inner(self, days).await
    }
}
