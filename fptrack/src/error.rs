//! Error types for track record handling

/// Result type alias for record operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or rendering track records
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The record has no playable identifier
    #[error("Track record has no id")]
    MissingId,

    /// JSON (de)serialization failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A CSS selector could not be compiled
    #[error("Invalid selector '{0}'")]
    Selector(String),

    /// Scraping failed (no container, no items)
    #[error("Extraction failed: {0}")]
    Extraction(String),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }
}
