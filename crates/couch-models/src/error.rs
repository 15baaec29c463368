//! Model error types.

use thiserror::Error;

/// Result type for model parsing operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Invalid hex colour: {0}")]
    InvalidHex(String),

    #[error("Invalid video URL: {0}")]
    InvalidUrl(String),
}

impl ModelError {
    pub fn invalid_hex(value: impl Into<String>) -> Self {
        Self::InvalidHex(value.into())
    }
}
