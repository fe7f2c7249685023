use anyhow::Result;
use chrono::NaiveDate;
use sqlx::Row;

use genielytics_core::analytics::{
    DailyActivityRow, HourlyActivityRow, VisitorBucket, VisitorPeriod,
};

use crate::PgBackend;

/// Read the `daily_user_activity` view. The view carries its own fixed
/// ordering (newest date first, then conversations_started descending), so
/// no ORDER BY here.
pub(crate) async fn daily_activity_inner(db: &PgBackend) -> Result<Vec<DailyActivityRow>> {
    let pool = db.pool().await;
    let rows = sqlx::query(
        "SELECT activity_date, user_id, user_email, page_visits, conversations_started, \
                messages_sent, sql_responses, feedback_given \
         FROM daily_user_activity",
    )
    .fetch_all(&pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DailyActivityRow {
                activity_date: row.try_get("activity_date")?,
                user_id: row.try_get("user_id")?,
                user_email: row.try_get("user_email")?,
                page_visits: row.try_get("page_visits")?,
                conversations_started: row.try_get("conversations_started")?,
                messages_sent: row.try_get("messages_sent")?,
                sql_responses: row.try_get("sql_responses")?,
                feedback_given: row.try_get("feedback_given")?,
            })
        })
        .collect()
}

/// Event volume per hour of day (0–23) over conversation/message events.
///
/// Deliberately sums across all dates — this answers "what hour is busiest
/// on average", not "when was the absolute peak". The source system
/// aggregated the same way; kept as-is rather than silently per-dating it.
pub(crate) async fn activity_by_hour_inner(db: &PgBackend) -> Result<Vec<HourlyActivityRow>> {
    let pool = db.pool().await;
    let rows = sqlx::query(
        "SELECT CAST(EXTRACT(HOUR FROM timestamp) AS INTEGER) AS hour, COUNT(*) AS count \
         FROM user_events \
         WHERE event_type IN ('start_conversation', 'send_message') \
         GROUP BY 1 ORDER BY 1",
    )
    .fetch_all(&pool)
    .await?;

    rows.iter()
        .map(|row| {
            let hour: i32 = row.try_get("hour")?;
            Ok(HourlyActivityRow {
                hour: hour.max(0) as u32,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

/// Unique visitors (distinct users with page_visit events) per period
/// bucket, newest bucket first, with the dashboard's lookback window per
/// granularity: 30 days / 12 weeks / 12 months / 2 years.
pub(crate) async fn unique_visitors_inner(
    db: &PgBackend,
    period: VisitorPeriod,
) -> Result<Vec<VisitorBucket>> {
    let sql = match period {
        VisitorPeriod::Daily => {
            "SELECT DATE(timestamp) AS bucket, COUNT(DISTINCT user_id) AS unique_visitors \
             FROM user_events \
             WHERE event_type = 'page_visit' AND timestamp >= CURRENT_DATE - 30 \
             GROUP BY 1 ORDER BY 1 DESC"
        }
        VisitorPeriod::Weekly => {
            "SELECT DATE(date_trunc('week', timestamp)) AS bucket, \
                    COUNT(DISTINCT user_id) AS unique_visitors \
             FROM user_events \
             WHERE event_type = 'page_visit' AND timestamp >= CURRENT_DATE - 84 \
             GROUP BY 1 ORDER BY 1 DESC"
        }
        VisitorPeriod::Monthly => {
            "SELECT DATE(date_trunc('month', timestamp)) AS bucket, \
                    COUNT(DISTINCT user_id) AS unique_visitors \
             FROM user_events \
             WHERE event_type = 'page_visit' AND timestamp >= CURRENT_DATE - 365 \
             GROUP BY 1 ORDER BY 1 DESC"
        }
        VisitorPeriod::Quarterly => {
            "SELECT DATE(date_trunc('quarter', timestamp)) AS bucket, \
                    COUNT(DISTINCT user_id) AS unique_visitors \
             FROM user_events \
             WHERE event_type = 'page_visit' AND timestamp >= CURRENT_DATE - 730 \
             GROUP BY 1 ORDER BY 1 DESC"
        }
    };

    let pool = db.pool().await;
    let rows = sqlx::query(sql).fetch_all(&pool).await?;
    rows.iter()
        .map(|row| {
            let bucket: NaiveDate = row.try_get("bucket")?;
            Ok(VisitorBucket {
                bucket: bucket.to_string(),
                unique_visitors: row.try_get("unique_visitors")?,
            })
        })
        .collect()
}

impl PgBackend {
    pub async fn daily_activity(&self) -> Result<Vec<DailyActivityRow>> {
        daily_activity_inner(self).await
    }

    pub async fn activity_by_hour(&self) -> Result<Vec<HourlyActivityRow>> {
        activity_by_hour_inner(self).await
    }

    pub async fn unique_visitors(&self, period: VisitorPeriod) -> Result<Vec<VisitorBucket>> {
        unique_visitors_inner(self, period).await
    }
}
