use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;

use genielytics_core::analytics::EventQuery;
use genielytics_core::event::{Event, NewEvent};

use crate::PgBackend;

/// Insert a batch of events in a single transaction, returning the ids the
/// database assigned, in input order.
///
/// The whole batch commits or none of it does. Appends never touch existing
/// rows, so concurrent sessions do not contend with each other.
///
/// Returns immediately (no-op) if `events` is empty.
pub(crate) async fn append_events_inner(db: &PgBackend, events: &[NewEvent]) -> Result<Vec<i64>> {
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let pool = db.pool().await;
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(events.len());

    for event in events {
        let row = sqlx::query(
            r#"INSERT INTO user_events (
                event_type, user_id, user_email, user_name,
                conversation_id, message_id, feedback_type,
                session_id, metadata, comment, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING event_id"#,
        )
        .bind(event.event_type.as_str())
        .bind(&event.user_id)
        .bind(&event.user_email)
        .bind(&event.user_name)
        .bind(&event.conversation_id)
        .bind(&event.message_id)
        .bind(event.feedback_type.map(|k| k.as_str()))
        .bind(&event.session_id)
        .bind(&event.metadata)
        .bind(&event.comment)
        .bind(event.timestamp)
        .fetch_one(&mut *tx)
        .await?;
        ids.push(row.try_get::<i64, _>("event_id")?);
    }

    tx.commit().await?;
    tracing::debug!(count = events.len(), "appended events");
    Ok(ids)
}

/// Fetch raw events, newest first, with every filter optional.
///
/// The four filter columns (time range, user, conversation, session) are the
/// ones the auxiliary indexes cover; arbitrary metadata predicates are
/// deliberately not offered here.
pub(crate) async fn list_events_inner(db: &PgBackend, query: &EventQuery) -> Result<Vec<Event>> {
    let mut sql = String::from(
        "SELECT event_id, event_type, user_id, user_email, user_name, \
                conversation_id, message_id, feedback_type, session_id, \
                metadata, comment, timestamp \
         FROM user_events WHERE 1 = 1",
    );
    let mut idx = 0usize;
    let mut push = |sql: &mut String, clause: &str| {
        idx += 1;
        sql.push_str(&clause.replace("$n", &format!("${idx}")));
    };

    if query.start.is_some() {
        push(&mut sql, " AND timestamp >= $n");
    }
    if query.end.is_some() {
        push(&mut sql, " AND timestamp < $n");
    }
    if query.user_id.is_some() {
        push(&mut sql, " AND user_id = $n");
    }
    if query.conversation_id.is_some() {
        push(&mut sql, " AND conversation_id = $n");
    }
    if query.session_id.is_some() {
        push(&mut sql, " AND session_id = $n");
    }
    push(&mut sql, " ORDER BY event_id DESC LIMIT $n");

    let mut q = sqlx::query(&sql);
    if let Some(start) = query.start {
        q = q.bind(start);
    }
    if let Some(end) = query.end {
        q = q.bind(end);
    }
    if let Some(ref user_id) = query.user_id {
        q = q.bind(user_id);
    }
    if let Some(ref conversation_id) = query.conversation_id {
        q = q.bind(conversation_id);
    }
    if let Some(ref session_id) = query.session_id {
        q = q.bind(session_id);
    }
    q = q.bind(query.limit.max(1));

    let pool = db.pool().await;
    let rows = q.fetch_all(&pool).await?;
    rows.iter().map(event_from_row).collect()
}

fn event_from_row(row: &PgRow) -> Result<Event> {
    let event_type: String = row.try_get("event_type")?;
    let feedback_type: Option<String> = row.try_get("feedback_type")?;
    Ok(Event {
        event_id: row.try_get("event_id")?,
        event_type: event_type.parse().map_err(anyhow::Error::msg)?,
        user_id: row.try_get("user_id")?,
        user_email: row.try_get("user_email")?,
        user_name: row.try_get("user_name")?,
        conversation_id: row.try_get("conversation_id")?,
        message_id: row.try_get("message_id")?,
        feedback_type: feedback_type
            .as_deref()
            .map(|raw| raw.parse().map_err(anyhow::Error::msg))
            .transpose()?,
        session_id: row.try_get("session_id")?,
        metadata: row.try_get("metadata")?,
        comment: row.try_get("comment")?,
        timestamp: row.try_get("timestamp")?,
    })
}

impl PgBackend {
    pub async fn append_events(&self, events: &[NewEvent]) -> Result<Vec<i64>> {
        append_events_inner(self, events).await
    }

    pub async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>> {
        list_events_inner(self, query).await
    }
}
