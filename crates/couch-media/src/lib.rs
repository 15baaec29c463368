//! Media side of the couch pipeline.
//!
//! This crate provides:
//! - yt-dlp playlist listing and video download
//! - FFprobe inspection and streaming frame sampling via FFmpeg
//! - YOLOv8 detection and segmentation over ONNX Runtime
//! - Dominant-colour extraction and colour rendering (strips, grids, GIFs)

pub mod detection;
pub mod download;
pub mod error;
pub mod frames;
pub mod palette;
pub mod probe;
pub mod render;
pub mod scroll;

pub use detection::{
    apply_mask, coco_class_id, scan_video_for_best_frame, BestFrame, BestFrameTracker,
    InstanceMask, InstanceSegment, ObjectDetect, ObjectDetection, ObjectDetector,
    ObjectDetectorConfig, Segmenter, SegmenterConfig, COCO_CLASSES,
};
pub use download::{download_video, list_playlist, PlaylistEntry, Thumbnail, DEFAULT_VIDEO_FORMAT};
pub use error::{MediaError, MediaResult};
pub use frames::{FrameSampler, SampledFrame};
pub use palette::{extract_palette, Palette, PaletteConfig, PaletteEntry, PaletteError};
pub use probe::{probe_video, VideoInfo};
pub use render::{
    encode_for_path, grid, proportional_square, stack_vertically, swatch, weighted_strip,
};
pub use scroll::{encode_scroll_gif, ScrollConfig};
