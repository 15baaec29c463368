//! Labeler error types.

use thiserror::Error;

/// Result type for labeler operations.
pub type LabelerResult<T> = Result<T, LabelerError>;

/// Errors from the colour labeling service.
#[derive(Debug, Error)]
pub enum LabelerError {
    #[error("API key not configured (set OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Model refused: {0}")]
    Refused(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LabelerError {
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Transport errors, rate limits and server errors may pass on a later run.
    pub fn is_transient(&self) -> bool {
        match self {
            LabelerError::Request(_) => true,
            LabelerError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
