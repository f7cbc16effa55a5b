//! Error types for the queue replacement engine

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while intercepting and rewriting responses
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Trigger payload is malformed, lacks a target or carries no usable record
    #[error("Invalid trigger event: {0}")]
    InvalidTrigger(String),

    /// Response body is not the expected JSON document
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream could not be reached or answered with an unreadable message
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Record handling failed
    #[error("Track error: {0}")]
    Track(#[from] fptrack::Error),

    /// Configuration error (from fpconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_trigger(msg: impl Into<String>) -> Self {
        Self::InvalidTrigger(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }
}
