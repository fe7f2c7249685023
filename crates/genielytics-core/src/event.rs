use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The five interaction kinds the chat front-end reports.
///
/// Wire form is snake_case and doubles as the TEXT stored in
/// `user_events.event_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageVisit,
    StartConversation,
    SendMessage,
    SqlResponse,
    Feedback,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageVisit => "page_visit",
            EventType::StartConversation => "start_conversation",
            EventType::SendMessage => "send_message",
            EventType::SqlResponse => "sql_response",
            EventType::Feedback => "feedback",
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "page_visit" => Ok(EventType::PageVisit),
            "start_conversation" => Ok(EventType::StartConversation),
            "send_message" => Ok(EventType::SendMessage),
            "sql_response" => Ok(EventType::SqlResponse),
            "feedback" => Ok(EventType::Feedback),
            other => Err(format!("unknown event_type: {other}")),
        }
    }
}

/// Thumbs-up / thumbs-down. Stored as TEXT in `user_events.feedback_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Positive,
    Negative,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Positive => "positive",
            FeedbackKind::Negative => "negative",
        }
    }
}

impl std::str::FromStr for FeedbackKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "positive" => Ok(FeedbackKind::Positive),
            "negative" => Ok(FeedbackKind::Negative),
            other => Err(format!("unknown feedback_type: {other}")),
        }
    }
}

/// The payload the chat UI sends to POST /api/events.
/// Wire field "type" maps to event_type in the database.
///
/// User identity fields are a local-development fallback only; in deployment
/// the server resolves identity from the proxy's forwarded headers and
/// ignores these when a header is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordPayload {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
    pub feedback_type: Option<FeedbackKind>,
    pub session_id: Option<String>,
    /// Free-text explanation; only valid alongside a feedback event.
    pub comment: Option<String>,
    /// Opaque structured context. Accepted as-is — the store never validates
    /// metadata; queries that read specific keys treat absence as NULL.
    pub metadata: Option<serde_json::Value>,
}

/// Accepts either a single event or a batch array at POST /api/events.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RecordOrBatch {
    Single(Box<RecordPayload>),
    Batch(Vec<RecordPayload>),
}

/// A fully-resolved event, ready for insertion: identity applied, session
/// assigned, timestamp stamped. `event_id` is assigned by the database
/// (BIGSERIAL) so insertion order and id order always agree.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
    pub feedback_type: Option<FeedbackKind>,
    pub session_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NewEvent {
    /// Enforce the cross-field rules the schema cannot express:
    /// feedback_type is required iff the event is feedback, and a comment
    /// only travels with a feedback event (the log is append-only, so there
    /// is no later opportunity to attach one).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        match self.event_type {
            EventType::Feedback => {
                if self.feedback_type.is_none() {
                    return Err(ValidationError::MissingFeedbackType);
                }
            }
            _ => {
                if self.feedback_type.is_some() {
                    return Err(ValidationError::UnexpectedFeedbackType);
                }
                if self.comment.is_some() {
                    return Err(ValidationError::UnexpectedComment);
                }
            }
        }
        Ok(())
    }
}

/// The stored row — mirrors the `user_events` table columns exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: i64,
    pub event_type: EventType,
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
    pub feedback_type: Option<FeedbackKind>,
    pub session_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Generate a fresh session identifier for callers that did not supply one.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: EventType) -> NewEvent {
        NewEvent {
            event_type,
            user_id: "user@example.com".to_string(),
            user_email: Some("user@example.com".to_string()),
            user_name: None,
            conversation_id: Some("conv-1".to_string()),
            message_id: Some("msg-1".to_string()),
            feedback_type: None,
            session_id: Some("sess-1".to_string()),
            metadata: None,
            comment: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn feedback_requires_feedback_type() {
        let mut e = event(EventType::Feedback);
        assert_eq!(e.validate(), Err(ValidationError::MissingFeedbackType));
        e.feedback_type = Some(FeedbackKind::Negative);
        assert_eq!(e.validate(), Ok(()));
    }

    #[test]
    fn feedback_type_rejected_on_other_events() {
        let mut e = event(EventType::SendMessage);
        e.feedback_type = Some(FeedbackKind::Positive);
        assert_eq!(e.validate(), Err(ValidationError::UnexpectedFeedbackType));
    }

    #[test]
    fn comment_only_valid_on_feedback() {
        let mut e = event(EventType::PageVisit);
        e.comment = Some("broken chart".to_string());
        assert_eq!(e.validate(), Err(ValidationError::UnexpectedComment));

        let mut fb = event(EventType::Feedback);
        fb.feedback_type = Some(FeedbackKind::Negative);
        fb.comment = Some("broken chart".to_string());
        assert_eq!(fb.validate(), Ok(()));
    }

    #[test]
    fn blank_user_id_rejected() {
        let mut e = event(EventType::PageVisit);
        e.user_id = "  ".to_string();
        assert_eq!(e.validate(), Err(ValidationError::EmptyUserId));
    }

    #[test]
    fn wire_form_is_snake_case() {
        let json = serde_json::to_string(&EventType::StartConversation).unwrap();
        assert_eq!(json, "\"start_conversation\"");
        let kind: FeedbackKind = serde_json::from_str("\"negative\"").unwrap();
        assert_eq!(kind, FeedbackKind::Negative);
    }

    #[test]
    fn batch_and_single_both_deserialize() {
        let single: RecordOrBatch =
            serde_json::from_str(r#"{"type": "page_visit", "session_id": "s1"}"#).unwrap();
        assert!(matches!(single, RecordOrBatch::Single(_)));

        let batch: RecordOrBatch =
            serde_json::from_str(r#"[{"type": "page_visit"}, {"type": "send_message"}]"#).unwrap();
        match batch {
            RecordOrBatch::Batch(items) => assert_eq!(items.len(), 2),
            RecordOrBatch::Single(_) => panic!("expected batch"),
        }
    }
}
