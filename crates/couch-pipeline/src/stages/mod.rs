//! Batch stages. Each one reads its inputs from disk (or a remote service),
//! writes its outputs next to them and skips work whose outputs already exist.

pub mod harvest;
pub mod join;
pub mod label;
pub mod locate;
pub mod segment;
pub mod visualize;

use std::path::Path;

use couch_media::MediaError;
use image::RgbImage;

use crate::error::PipelineResult;

pub use harvest::{harvest_entries, run_harvest};
pub use join::run_join;
pub use label::{label_couches, run_label};
pub use locate::{locate_videos, run_locate};
pub use segment::{run_segment, segment_couches};
pub use visualize::{
    render_composite, render_families, render_grid, render_scroll, render_strips, render_swatch,
};

/// Per-run tally of what a stage did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    /// Videos whose outputs were written this run
    pub processed: usize,
    /// Videos left alone (outputs present, or nothing to do)
    pub skipped: usize,
    /// Videos that failed and stay eligible for the next run
    pub failed: usize,
}

pub(crate) async fn load_rgb(path: &Path) -> PipelineResult<RgbImage> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()).into());
    }
    let bytes = tokio::fs::read(path).await?;
    let img = image::load_from_memory(&bytes).map_err(MediaError::from)?;
    Ok(img.to_rgb8())
}

/// Encode by extension and write atomically.
pub(crate) async fn save_image(img: &RgbImage, path: &Path) -> PipelineResult<()> {
    let bytes = couch_media::encode_for_path(img, path)?;
    couch_store::write_atomic(path, &bytes).await?;
    Ok(())
}
