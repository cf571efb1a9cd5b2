//! Error types for the chat orchestrator.

use charla_core::error::CharlaError;

/// Errors from the chat pipeline.
///
/// Search and time-tool failures never appear here: those branches degrade
/// internally and the pipeline proceeds without their results.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("completion provider error ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("completion error: {0}")]
    Completion(String),
}

impl From<CharlaError> for ChatError {
    fn from(err: CharlaError) -> Self {
        match err {
            CharlaError::Config(msg) => ChatError::Config(msg),
            CharlaError::Provider { status, message } => ChatError::Provider { status, message },
            CharlaError::Timeout(msg) => ChatError::Timeout(msg),
            other => ChatError::Completion(other.to_string()),
        }
    }
}
