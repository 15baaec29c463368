//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Thumbnail fetch failed: {0}")]
    ThumbnailFailed(String),

    #[error("Nothing to render: {0}")]
    NothingToRender(String),

    #[error("Media error: {0}")]
    Media(#[from] couch_media::MediaError),

    #[error("Palette error: {0}")]
    Palette(#[from] couch_media::PaletteError),

    #[error("Storage error: {0}")]
    Storage(#[from] couch_store::StorageError),

    #[error("Labeler error: {0}")]
    Labeler(#[from] couch_labeler::LabelerError),

    #[error("Model error: {0}")]
    Model(#[from] couch_models::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn thumbnail_failed(msg: impl Into<String>) -> Self {
        Self::ThumbnailFailed(msg.into())
    }

    pub fn nothing_to_render(msg: impl Into<String>) -> Self {
        Self::NothingToRender(msg.into())
    }

    /// External failures that leave the video eligible for the next run.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::ThumbnailFailed(_) => true,
            PipelineError::Media(e) => e.is_transient(),
            PipelineError::Labeler(e) => e.is_transient(),
            PipelineError::Io(_) => true,
            _ => false,
        }
    }
}
