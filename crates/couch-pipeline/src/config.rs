//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use couch_labeler::{LabelerConfig, LabelerError, LabelerResult};
use couch_media::{ObjectDetectorConfig, PaletteConfig, ScrollConfig, SegmenterConfig};
use couch_store::DataLayout;

/// "Never Too Small" official playlist.
pub const DEFAULT_PLAYLIST_URL: &str =
    "https://youtube.com/playlist?list=PL1WZky7MVeY_6H2ieeVKitXGd3npyPo-g";

/// Public raw URL of a best frame, `{video_id}` is substituted per video.
pub const DEFAULT_IMAGE_URL_TEMPLATE: &str =
    "https://github.com/j-jayes/grey-couches/blob/main/data/couch_images/{video_id}_couch.jpg?raw=true";

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Playlist listed by the harvest stage
    pub playlist_url: String,
    /// yt-dlp format selector for video downloads
    pub video_format: String,
    /// Keep downloaded videos after the frame scan
    pub keep_videos: bool,
    pub paths: PathsConfig,
    pub detection: DetectionSettings,
    pub segmentation: SegmentationSettings,
    pub labeler: LabelerSettings,
    pub render: RenderSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            playlist_url: DEFAULT_PLAYLIST_URL.to_string(),
            video_format: couch_media::DEFAULT_VIDEO_FORMAT.to_string(),
            keep_videos: false,
            paths: PathsConfig::default(),
            detection: DetectionSettings::default(),
            segmentation: SegmentationSettings::default(),
            labeler: LabelerSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            playlist_url: env_string("COUCH_PLAYLIST_URL", &defaults.playlist_url),
            video_format: env_string("COUCH_VIDEO_FORMAT", &defaults.video_format),
            keep_videos: env_or("COUCH_KEEP_VIDEOS", defaults.keep_videos),
            paths: PathsConfig::from_env(),
            detection: DetectionSettings::from_env(),
            segmentation: SegmentationSettings::from_env(),
            labeler: LabelerSettings::from_env(),
            render: RenderSettings::from_env(),
        }
    }

    pub fn layout(&self) -> DataLayout {
        self.paths.layout()
    }
}

/// Where artifacts live.
#[derive(Debug, Clone)]
pub struct PathsConfig {
    /// Root of every data artifact
    pub data_dir: PathBuf,
    /// Destination of the scroll GIF
    pub assets_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            assets_dir: PathBuf::from("assets"),
        }
    }
}

impl PathsConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(env_string("COUCH_DATA_DIR", "data")),
            assets_dir: PathBuf::from(env_string("COUCH_ASSETS_DIR", "assets")),
        }
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir, &self.assets_dir)
    }
}

/// Best-frame search settings for the locate stage.
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    /// Path to the YOLOv8 detection ONNX model
    pub model_path: String,
    /// Frames between two sampled frames
    pub frame_interval: u64,
    /// COCO label of the object to look for
    pub target_class: String,
    /// A detection must score strictly above this to count
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    /// Square model input size
    pub input_size: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            frame_interval: 100,
            target_class: "couch".to_string(),
            confidence_threshold: 0.7,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

impl DetectionSettings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            model_path: env_string("COUCH_DETECTION_MODEL", &d.model_path),
            frame_interval: env_or("COUCH_FRAME_INTERVAL", d.frame_interval),
            target_class: env_string("COUCH_TARGET_CLASS", &d.target_class),
            confidence_threshold: env_or("COUCH_DETECTION_CONFIDENCE", d.confidence_threshold),
            nms_threshold: env_or("COUCH_NMS_THRESHOLD", d.nms_threshold),
            input_size: env_or("COUCH_MODEL_INPUT_SIZE", d.input_size),
        }
    }

    pub fn detector_config(&self) -> ObjectDetectorConfig {
        ObjectDetectorConfig {
            model_path: self.model_path.clone(),
            confidence_threshold: self.confidence_threshold,
            nms_threshold: self.nms_threshold,
            input_size: self.input_size,
        }
    }
}

/// Segmentation and palette settings for the segment stage.
#[derive(Debug, Clone)]
pub struct SegmentationSettings {
    /// Path to the YOLOv8 segmentation ONNX model
    pub model_path: String,
    pub confidence_threshold: f32,
    pub mask_threshold: f32,
    /// Number of dominant colours stored per couch
    pub clusters: usize,
    /// Pixels with every channel at or below this are background
    pub background_threshold: u8,
    /// k-means seed
    pub seed: u64,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n-seg.onnx".to_string(),
            confidence_threshold: 0.25,
            mask_threshold: 0.5,
            clusters: 5,
            background_threshold: 30,
            seed: 42,
        }
    }
}

impl SegmentationSettings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            model_path: env_string("COUCH_SEGMENTATION_MODEL", &d.model_path),
            confidence_threshold: env_or("COUCH_SEGMENTATION_CONFIDENCE", d.confidence_threshold),
            mask_threshold: env_or("COUCH_MASK_THRESHOLD", d.mask_threshold),
            clusters: env_or("COUCH_PALETTE_CLUSTERS", d.clusters),
            background_threshold: env_or("COUCH_BACKGROUND_THRESHOLD", d.background_threshold),
            seed: env_or("COUCH_PALETTE_SEED", d.seed),
        }
    }

    pub fn segmenter_config(&self, nms_threshold: f32, input_size: u32) -> SegmenterConfig {
        SegmenterConfig {
            model_path: self.model_path.clone(),
            confidence_threshold: self.confidence_threshold,
            nms_threshold,
            input_size,
            mask_threshold: self.mask_threshold,
        }
    }

    pub fn palette_config(&self) -> PaletteConfig {
        PaletteConfig {
            background_threshold: self.background_threshold,
            seed: self.seed,
            ..PaletteConfig::default()
        }
    }
}

/// Hosted labeler settings.
#[derive(Debug, Clone)]
pub struct LabelerSettings {
    /// Read from `OPENAI_API_KEY`
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Public image URL with a `{video_id}` placeholder
    pub image_url_template: String,
    /// Maximum detected couches considered per run
    pub limit: Option<usize>,
    pub timeout: Duration,
}

impl Default for LabelerSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: couch_labeler::DEFAULT_BASE_URL.to_string(),
            model: couch_labeler::DEFAULT_MODEL.to_string(),
            max_tokens: couch_labeler::DEFAULT_MAX_TOKENS,
            image_url_template: DEFAULT_IMAGE_URL_TEMPLATE.to_string(),
            limit: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl LabelerSettings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url: env_string("COUCH_LABELER_BASE_URL", &d.base_url),
            model: env_string("COUCH_LABELER_MODEL", &d.model),
            max_tokens: env_or("COUCH_LABELER_MAX_TOKENS", d.max_tokens),
            image_url_template: env_string("COUCH_IMAGE_URL_TEMPLATE", &d.image_url_template),
            limit: std::env::var("COUCH_LABEL_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok()),
            timeout: Duration::from_secs(env_or("COUCH_LABELER_TIMEOUT_SECS", 60)),
        }
    }

    pub fn labeler_config(&self) -> LabelerResult<LabelerConfig> {
        let api_key = self.api_key.clone().ok_or(LabelerError::MissingApiKey)?;
        Ok(LabelerConfig {
            api_key,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        })
    }
}

/// Sizes of every rendered raster.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Per-video weighted strips
    pub strip_width: u32,
    pub strip_height: u32,
    pub strip_clusters: usize,
    /// One-colour rows of the sorted composite
    pub composite_width: u32,
    pub composite_height: u32,
    /// Five-colour rows of the family composite
    pub family_width: u32,
    pub family_height: u32,
    pub family_clusters: usize,
    pub grid_square: u32,
    pub grid_columns: u32,
    pub swatch_width: u32,
    pub swatch_height: u32,
    pub scroll: ScrollConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            strip_width: 1200,
            strip_height: 200,
            strip_clusters: 5,
            composite_width: 500,
            composite_height: 50,
            family_width: 300,
            family_height: 50,
            family_clusters: 5,
            grid_square: 100,
            grid_columns: 10,
            swatch_width: 1200,
            swatch_height: 200,
            scroll: ScrollConfig::default(),
        }
    }
}

impl RenderSettings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            strip_width: env_or("COUCH_STRIP_WIDTH", d.strip_width),
            strip_height: env_or("COUCH_STRIP_HEIGHT", d.strip_height),
            strip_clusters: env_or("COUCH_STRIP_CLUSTERS", d.strip_clusters),
            composite_width: env_or("COUCH_COMPOSITE_WIDTH", d.composite_width),
            composite_height: env_or("COUCH_COMPOSITE_HEIGHT", d.composite_height),
            family_width: env_or("COUCH_FAMILY_WIDTH", d.family_width),
            family_height: env_or("COUCH_FAMILY_HEIGHT", d.family_height),
            family_clusters: env_or("COUCH_FAMILY_CLUSTERS", d.family_clusters),
            grid_square: env_or("COUCH_GRID_SQUARE", d.grid_square),
            grid_columns: env_or("COUCH_GRID_COLUMNS", d.grid_columns),
            swatch_width: env_or("COUCH_SWATCH_WIDTH", d.swatch_width),
            swatch_height: env_or("COUCH_SWATCH_HEIGHT", d.swatch_height),
            scroll: ScrollConfig {
                window_height: env_or("COUCH_SCROLL_WINDOW", d.scroll.window_height),
                step: env_or("COUCH_SCROLL_STEP", d.scroll.step),
                frame_delay_ms: env_or("COUCH_SCROLL_DELAY_MS", d.scroll.frame_delay_ms),
            },
        }
    }
}
