use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::Row;

use genielytics_core::analytics::{RetentionCohortRow, RetentionPeriod, RetentionResponse};

use crate::PgBackend;

/// Raw (cohort, offset) cell as it comes back from SQL.
#[derive(Debug)]
pub(crate) struct RetentionRawRow {
    pub cohort_date: NaiveDate,
    pub cohort_size: i64,
    pub day_offset: u32,
    pub retained: i64,
}

/// A cohort is every user whose first event (of any type) fell on the same
/// calendar date. A user is retained at offset d when they have at least one
/// event on cohort_date + d — ever-returned semantics, no decay window, so
/// activity on day 7 alone counts toward offset 7 and nothing in between.
pub(crate) async fn retention_inner(db: &PgBackend, max_offsets: u32) -> Result<RetentionResponse> {
    let max_offsets = clamp_max_offsets(max_offsets);
    let pool = db.pool().await;

    let rows = sqlx::query(
        r#"WITH cohorts AS (
            SELECT user_id, MIN(DATE(timestamp)) AS cohort_date
            FROM user_events
            GROUP BY user_id
        ),
        activity AS (
            SELECT DISTINCT user_id, DATE(timestamp) AS activity_date
            FROM user_events
        ),
        cohort_sizes AS (
            SELECT cohort_date, COUNT(*) AS cohort_size
            FROM cohorts
            GROUP BY cohort_date
        )
        SELECT
            c.cohort_date,
            cs.cohort_size,
            (a.activity_date - c.cohort_date) AS day_offset,
            COUNT(DISTINCT c.user_id) AS retained
        FROM cohorts c
        JOIN activity a ON a.user_id = c.user_id
        JOIN cohort_sizes cs ON cs.cohort_date = c.cohort_date
        WHERE (a.activity_date - c.cohort_date) BETWEEN 0 AND $1
        GROUP BY c.cohort_date, cs.cohort_size, day_offset
        ORDER BY c.cohort_date, day_offset"#,
    )
    .bind(max_offsets as i32 - 1)
    .fetch_all(&pool)
    .await?;

    let raw = rows
        .iter()
        .map(|row| {
            let day_offset: i32 = row.try_get("day_offset")?;
            Ok(RetentionRawRow {
                cohort_date: row.try_get("cohort_date")?,
                cohort_size: row.try_get("cohort_size")?,
                day_offset: day_offset.max(0) as u32,
                retained: row.try_get("retained")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RetentionResponse {
        max_offsets,
        rows: build_rows(raw, max_offsets),
    })
}

pub(crate) fn clamp_max_offsets(max_offsets: u32) -> u32 {
    max_offsets.clamp(1, 30)
}

/// Group the sparse SQL cells by cohort and zero-fill every offset up to
/// `max_offsets`, so the dashboard always gets a rectangular grid.
pub(crate) fn build_rows(raw: Vec<RetentionRawRow>, max_offsets: u32) -> Vec<RetentionCohortRow> {
    let mut grouped: BTreeMap<NaiveDate, (i64, HashMap<u32, RetentionPeriod>)> = BTreeMap::new();

    for cell in raw {
        let entry = grouped
            .entry(cell.cohort_date)
            .or_insert_with(|| (cell.cohort_size, HashMap::new()));
        entry.0 = cell.cohort_size;
        let rate = if cell.cohort_size > 0 {
            cell.retained as f64 / cell.cohort_size as f64
        } else {
            0.0
        };
        entry.1.insert(
            cell.day_offset,
            RetentionPeriod {
                offset: cell.day_offset,
                retained: cell.retained,
                rate,
            },
        );
    }

    grouped
        .into_iter()
        .map(|(cohort_date, (cohort_size, cells))| {
            let periods = (0..max_offsets)
                .map(|offset| {
                    cells.get(&offset).cloned().unwrap_or(RetentionPeriod {
                        offset,
                        retained: 0,
                        rate: 0.0,
                    })
                })
                .collect::<Vec<_>>();

            RetentionCohortRow {
                cohort_date: cohort_date.to_string(),
                cohort_size,
                periods,
            }
        })
        .collect()
}

impl PgBackend {
    pub async fn retention(&self, max_offsets: u32) -> Result<RetentionResponse> {
        retention_inner(self, max_offsets).await
    }
}
