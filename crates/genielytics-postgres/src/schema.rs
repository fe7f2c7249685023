/// PostgreSQL initialization SQL.
///
/// Executed once at pool creation via `sqlx::raw_sql`. All statements use
/// `IF NOT EXISTS` / `CREATE OR REPLACE` so they are safe to re-run on every
/// startup (idempotent).
///
/// Both views recompute from the full `user_events` table on every query —
/// no materialization, no incremental maintenance. That is fine at
/// small-to-moderate event volumes; past that, switch to materialized views
/// refreshed on the dashboard cadence, or add date-range predicates at the
/// call sites.
///
/// Calendar-date truncation (`DATE(timestamp)`) follows the database session
/// TimeZone, which the backend sets from `GENIELYTICS_TIMEZONE` on every
/// connection.
pub const INIT_SQL: &str = r#"
-- ===========================================
-- USER EVENTS (append-only interaction log)
-- ===========================================
-- Rows are inserted exactly once and never updated or deleted. event_id is
-- BIGSERIAL so id order always agrees with insertion order. A changed
-- thumbs-vote appends a new feedback row; readers that want the current
-- vote take the latest row per (user_id, conversation_id, message_id).
CREATE TABLE IF NOT EXISTS user_events (
    event_id        BIGSERIAL PRIMARY KEY,
    event_type      TEXT NOT NULL,                 -- 'page_visit' | 'start_conversation' | 'send_message' | 'sql_response' | 'feedback'
    user_id         TEXT NOT NULL,
    user_email      TEXT,
    user_name       TEXT,
    conversation_id TEXT,
    message_id      TEXT,
    feedback_type   TEXT,                          -- 'positive' | 'negative'; set iff event_type = 'feedback'
    session_id      TEXT,
    metadata        JSONB,                         -- open-ended payload; never validated on write
    timestamp       TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Primary query pattern: recent events, newest first
CREATE INDEX IF NOT EXISTS idx_user_events_time
    ON user_events(timestamp DESC);

-- Per-user history and cohort lookups
CREATE INDEX IF NOT EXISTS idx_user_events_user_time
    ON user_events(user_id, timestamp DESC);

-- Conversation rollups (metrics view, history sidebar)
CREATE INDEX IF NOT EXISTS idx_user_events_conversation
    ON user_events(conversation_id, timestamp);

-- Session reconciliation and session-scoped reads
CREATE INDEX IF NOT EXISTS idx_user_events_session
    ON user_events(session_id, timestamp);

-- Event-type breakdowns within a date range (NPS, visitors, trends)
CREATE INDEX IF NOT EXISTS idx_user_events_type_time
    ON user_events(event_type, timestamp);

-- Feedback comments shipped after launch; existing deployments pick the
-- column up here.
ALTER TABLE user_events ADD COLUMN IF NOT EXISTS comment TEXT;

-- ===========================================
-- USER SESSIONS (rollup, updated on each event)
-- ===========================================
-- One row per session_id, maintained by a single-statement upsert so
-- concurrent requests for the same session serialize inside PostgreSQL.
-- The rollup is a convenience cache: the event log is the source of truth
-- and reconcile_session() rebuilds any row from it.
CREATE TABLE IF NOT EXISTS user_sessions (
    session_id              TEXT PRIMARY KEY,
    user_id                 TEXT NOT NULL,
    user_email              TEXT,
    user_name               TEXT,
    first_visit             TIMESTAMPTZ NOT NULL,
    last_activity           TIMESTAMPTZ NOT NULL,
    total_conversations     BIGINT NOT NULL DEFAULT 0,
    total_messages          BIGINT NOT NULL DEFAULT 0,
    total_positive_feedback BIGINT NOT NULL DEFAULT 0,
    total_negative_feedback BIGINT NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_user_sessions_user
    ON user_sessions(user_id, last_activity DESC);

-- ===========================================
-- USER FAVORITES (saved question/query pairs)
-- ===========================================
-- Pure CRUD, scoped to user_id. No references to events or sessions.
CREATE TABLE IF NOT EXISTS user_favorites (
    id          BIGSERIAL PRIMARY KEY,
    user_id     TEXT NOT NULL,
    user_email  TEXT,
    question    TEXT NOT NULL,
    sql_query   TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_user_favorites_user
    ON user_favorites(user_id, created_at DESC);

-- ===========================================
-- VIEWS (recomputed on every read)
-- ===========================================
-- One row per (date, user): filtered counts per event type. Display order
-- is fixed: newest date first, most conversations first within a date.
CREATE OR REPLACE VIEW daily_user_activity AS
SELECT
    DATE(timestamp)  AS activity_date,
    user_id,
    MAX(user_email)  AS user_email,
    COUNT(*) FILTER (WHERE event_type = 'page_visit')         AS page_visits,
    COUNT(*) FILTER (WHERE event_type = 'start_conversation') AS conversations_started,
    COUNT(*) FILTER (WHERE event_type = 'send_message')       AS messages_sent,
    COUNT(*) FILTER (WHERE event_type = 'sql_response')       AS sql_responses,
    COUNT(*) FILTER (WHERE event_type = 'feedback')           AS feedback_given
FROM user_events
GROUP BY DATE(timestamp), user_id
ORDER BY activity_date DESC, conversations_started DESC;

-- One row per conversation: message volume, feedback counts, and a computed
-- rated/unrated status (rated iff at least one feedback event exists).
CREATE OR REPLACE VIEW conversation_metrics AS
SELECT
    conversation_id,
    user_id,
    MIN(timestamp) AS started_at,
    COUNT(*) FILTER (WHERE event_type = 'send_message') AS message_count,
    COUNT(*) FILTER (WHERE event_type = 'feedback' AND feedback_type = 'positive') AS positive_feedback,
    COUNT(*) FILTER (WHERE event_type = 'feedback' AND feedback_type = 'negative') AS negative_feedback,
    CASE
        WHEN COUNT(*) FILTER (WHERE event_type = 'feedback') > 0 THEN 'rated'
        ELSE 'unrated'
    END AS feedback_status
FROM user_events
WHERE conversation_id IS NOT NULL
GROUP BY conversation_id, user_id
ORDER BY started_at DESC;
"#;
