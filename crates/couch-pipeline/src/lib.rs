//! Batch pipeline that builds the couch colour dataset.
//!
//! This crate provides:
//! - Configuration loaded from the environment
//! - Stage runners (harvest, locate, segment, label, join, visualisers)
//! - Structured per-video logging

pub mod config;
pub mod error;
pub mod logging;
pub mod stages;

pub use config::{
    DetectionSettings, LabelerSettings, PathsConfig, PipelineConfig, RenderSettings,
    SegmentationSettings,
};
pub use error::{PipelineError, PipelineResult};
pub use logging::StageLogger;
pub use stages::StageReport;
