//! On-disk layout of every pipeline artifact.

use couch_models::VideoId;
use std::path::{Path, PathBuf};

pub const CATALOG_FILE: &str = "never_too_small_official_playlist.json";
pub const DETECTION_STORE_FILE: &str = "couch_info.json";
pub const JOINED_FILE: &str = "couch_info_with_colour_classifications.json";
pub const LABEL_COUNTS_FILE: &str = "couch_colour_counts.json";
pub const SWATCH_FILE: &str = "couch_hex_swatch.png";
pub const SCROLL_GIF_FILE: &str = "scrolled_couch_colors.gif";

/// Paths under a data directory, plus the assets directory for the GIF.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
    assets: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>, assets: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            assets: assets.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join("thumbnails")
    }

    pub fn thumbnail(&self, id: &VideoId) -> PathBuf {
        self.thumbnails_dir().join(format!("{}.png", id))
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    pub fn video(&self, id: &VideoId) -> PathBuf {
        self.videos_dir().join(format!("{}.mp4", id))
    }

    pub fn detection_store(&self) -> PathBuf {
        self.root.join(DETECTION_STORE_FILE)
    }

    pub fn best_frames_dir(&self) -> PathBuf {
        self.root.join("couch_images")
    }

    pub fn best_frame(&self, id: &VideoId) -> PathBuf {
        self.best_frames_dir().join(format!("{}_couch.jpg", id))
    }

    pub fn segmented_dir(&self) -> PathBuf {
        self.root.join("couch_images_segmented")
    }

    pub fn segmented(&self, id: &VideoId) -> PathBuf {
        self.segmented_dir().join(format!("{}.jpg", id))
    }

    pub fn hex_values_dir(&self) -> PathBuf {
        self.root.join("couch_hex_values")
    }

    pub fn classifications_dir(&self) -> PathBuf {
        self.root.join("couch_colour_classifications_2")
    }

    pub fn joined(&self) -> PathBuf {
        self.root.join(JOINED_FILE)
    }

    pub fn label_counts(&self) -> PathBuf {
        self.root.join(LABEL_COUNTS_FILE)
    }

    pub fn strips_dir(&self) -> PathBuf {
        self.root.join("couch_images_segmented_colour_strips")
    }

    pub fn strip(&self, id: &VideoId) -> PathBuf {
        self.strips_dir().join(format!("{}.jpg", id))
    }

    pub fn aggregated_dir(&self) -> PathBuf {
        self.root.join("couch_images_segmented_aggregated")
    }

    pub fn composite(&self) -> PathBuf {
        self.aggregated_dir().join("couch_color_composite_sorted.jpg")
    }

    pub fn grid(&self) -> PathBuf {
        self.aggregated_dir().join("couch_color_grid_sorted.jpg")
    }

    pub fn families(&self) -> PathBuf {
        self.aggregated_dir().join("couch_color_composite_by_family.jpg")
    }

    pub fn swatch(&self) -> PathBuf {
        self.root.join(SWATCH_FILE)
    }

    pub fn scroll_gif(&self) -> PathBuf {
        self.assets.join(SCROLL_GIF_FILE)
    }

    /// Relative-or-absolute path rendered the way records store it.
    pub fn display_path(path: &Path) -> String {
        path.to_string_lossy().replace('\\', "/")
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("data", "assets")
    }
}
