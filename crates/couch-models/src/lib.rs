//! Shared data models for the couch colour pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Playlist catalog entries
//! - Per-video detection records
//! - Colour classifications and the joined dataset table
//! - Colour math (RGB/HSV/hex) and colour-family buckets

pub mod classification;
pub mod color;
pub mod detection;
pub mod error;
pub mod video;

// Re-export common types
pub use classification::{
    left_join, normalize_label, summarize_labels, ColorClassification, CouchColourLabel,
    JoinedRecord, LabelCount,
};
pub use color::{ColorFamily, Hsv, Rgb};
pub use detection::{DetectionIndex, DetectionRecord};
pub use error::{ModelError, ModelResult};
pub use video::{merge_new_videos, VideoId, VideoRecord};
