use thiserror::Error;

/// Rejections produced when validating an incoming event payload.
///
/// Validation happens at the HTTP edge; the store itself accepts whatever it
/// is given (metadata in particular is never inspected on the write path).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("feedback events require feedback_type (positive or negative)")]
    MissingFeedbackType,

    #[error("feedback_type is only valid on feedback events")]
    UnexpectedFeedbackType,

    #[error("comment is only valid on feedback events")]
    UnexpectedComment,

    #[error("user_id must not be empty")]
    EmptyUserId,
}
