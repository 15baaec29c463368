//! YOLOv8 detection and instance segmentation over ONNX Runtime.
//!
//! Both models share preprocessing (letterless resize to a square input,
//! CHW f32 in [0, 1]) and the `[features, anchors]` output layout, so the
//! decoding and NMS helpers live here.

pub mod best_frame;
pub mod object_detector;
pub mod segmenter;

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::ArrayView2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

pub use best_frame::{scan_video_for_best_frame, BestFrame, BestFrameTracker};
pub use object_detector::{ObjectDetector, ObjectDetectorConfig};
pub use segmenter::{apply_mask, InstanceMask, Segmenter, SegmenterConfig};

/// Number of COCO classes the YOLOv8 heads predict.
pub const NUM_CLASSES: usize = 80;

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Class id for a COCO label such as `"couch"`.
pub fn coco_class_id(label: &str) -> MediaResult<usize> {
    COCO_CLASSES
        .iter()
        .position(|c| c.eq_ignore_ascii_case(label.trim()))
        .ok_or_else(|| MediaError::detection_failed(format!("Unknown COCO class: {}", label)))
}

/// Detected object with bounding box and classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDetection {
    /// Bounding box in normalized coordinates [0, 1]
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// COCO class ID (57 = couch)
    pub class_id: usize,
    /// Detection confidence [0, 1]
    pub confidence: f32,
}

impl ObjectDetection {
    /// Pixel corners `(x1, y1, x2, y2)`, truncated toward zero.
    pub fn pixel_box(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        (
            (self.x * fw) as u32,
            (self.y * fh) as u32,
            ((self.x + self.width) * fw) as u32,
            ((self.y + self.height) * fh) as u32,
        )
    }

    /// Integer box area divided by frame area.
    pub fn area_ratio(&self, frame_width: u32, frame_height: u32) -> f64 {
        let frame_area = frame_width as u64 * frame_height as u64;
        if frame_area == 0 {
            return 0.0;
        }
        let (x1, y1, x2, y2) = self.pixel_box(frame_width, frame_height);
        let box_area = x2.saturating_sub(x1) as u64 * y2.saturating_sub(y1) as u64;
        box_area as f64 / frame_area as f64
    }
}

/// Bounding-box detector over single RGB frames.
pub trait ObjectDetect: Send + Sync {
    fn detect(&self, frame: &RgbImage) -> MediaResult<Vec<ObjectDetection>>;
}

/// Instance segmentation over single RGB images.
pub trait InstanceSegment: Send + Sync {
    fn segment(&self, image: &RgbImage) -> MediaResult<Vec<InstanceMask>>;
}

/// Candidate box plus the anchor column it was decoded from.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub detection: ObjectDetection,
    pub anchor: usize,
}

/// Anchor count of a YOLOv8 head for a square input (strides 8, 16, 32).
pub(crate) fn num_anchors(input_size: u32) -> usize {
    [8u32, 16, 32]
        .iter()
        .map(|s| {
            let cells = (input_size / s) as usize;
            cells * cells
        })
        .sum()
}

/// Resize to `input_size` square and lay out as `[1, 3, H, W]` in [0, 1].
pub(crate) fn preprocess(img: &RgbImage, input_size: u32) -> MediaResult<Value> {
    let resized = image::imageops::resize(img, input_size, input_size, FilterType::Triangle);
    let (w, h) = (input_size as usize, input_size as usize);

    let mut chw_data: Vec<f32> = vec![0.0; 3 * h * w];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            chw_data[c * h * w + offset] = pixel[c] as f32 / 255.0;
        }
    }

    let shape = vec![1usize, 3, h, w];
    Tensor::from_array((shape, chw_data.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::internal(format!("Failed to create tensor: {}", e)))
}

/// Decode `[4 + 80 + extra, anchors]` head output into thresholded candidates.
///
/// Boxes come out normalized to the original frame and clamped to [0, 1].
pub(crate) fn decode_candidates(
    output: &[f32],
    extra_features: usize,
    input_size: u32,
    confidence_threshold: f32,
) -> MediaResult<Vec<Candidate>> {
    let anchors = num_anchors(input_size);
    let features = 4 + NUM_CLASSES + extra_features;

    let view = ArrayView2::from_shape((features, anchors), output).map_err(|_| {
        MediaError::internal(format!(
            "Unexpected output size: expected {}, got {}",
            features * anchors,
            output.len()
        ))
    })?;

    let input = input_size as f32;
    let mut candidates = Vec::new();

    for i in 0..anchors {
        let mut best_class = 0;
        let mut best_score = 0.0f32;
        for c in 0..NUM_CLASSES {
            let score = view[[4 + c, i]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < confidence_threshold {
            continue;
        }

        let cx = view[[0, i]];
        let cy = view[[1, i]];
        let w = view[[2, i]];
        let h = view[[3, i]];

        // Model space is a stretched square, so normalizing by the input
        // size maps straight back onto the original frame.
        let x = ((cx - w / 2.0) / input).clamp(0.0, 1.0);
        let y = ((cy - h / 2.0) / input).clamp(0.0, 1.0);
        let width = (w / input).min(1.0 - x).max(0.0);
        let height = (h / input).min(1.0 - y).max(0.0);

        candidates.push(Candidate {
            detection: ObjectDetection {
                x,
                y,
                width,
                height,
                class_id: best_class,
                confidence: best_score,
            },
            anchor: i,
        });
    }

    Ok(candidates)
}

/// Per-class non-maximum suppression; survivors sorted by confidence.
pub(crate) fn non_maximum_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.detection.confidence.total_cmp(&a.detection.confidence));

    let mut keep: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..candidates.len() {
            if suppressed[j] || candidates[i].detection.class_id != candidates[j].detection.class_id
            {
                continue;
            }
            if compute_iou(&candidates[i].detection, &candidates[j].detection) > iou_threshold {
                suppressed[j] = true;
            }
        }
        keep.push(candidates[i].clone());
    }

    keep
}

/// Intersection over union of two normalized boxes.
pub fn compute_iou(a: &ObjectDetection, b: &ObjectDetection) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Create ONNX Runtime session with automatic execution provider selection.
pub(crate) fn create_session(model_path: &Path) -> MediaResult<Session> {
    if !model_path.exists() {
        return Err(MediaError::model_not_found(model_path.display().to_string()));
    }

    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!(model = %model_path.display(), "Using CUDA execution provider");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, using CPU");
    }

    debug!(model = %model_path.display(), "Loading ONNX model on CPU");
    let session = builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))?;
    info!(model = %model_path.display(), "ONNX model loaded");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, w: f32, h: f32, class_id: usize, confidence: f32) -> ObjectDetection {
        ObjectDetection {
            x,
            y,
            width: w,
            height: h,
            class_id,
            confidence,
        }
    }

    #[test]
    fn test_coco_classes() {
        assert_eq!(COCO_CLASSES.len(), NUM_CLASSES);
        assert_eq!(COCO_CLASSES[57], "couch");
        assert_eq!(coco_class_id("couch").unwrap(), 57);
        assert_eq!(coco_class_id(" Couch ").unwrap(), 57);
        assert!(coco_class_id("sofa").is_err());
    }

    #[test]
    fn test_num_anchors() {
        assert_eq!(num_anchors(640), 8400);
        assert_eq!(num_anchors(320), 2100);
    }

    #[test]
    fn test_area_ratio_uses_truncated_pixels() {
        let d = det(0.1, 0.1, 0.5, 0.5, 57, 0.9);
        // 100x100 frame: corners (10, 10) to (60, 60)
        assert!((d.area_ratio(100, 100) - 0.25).abs() < 1e-9);
        assert_eq!(d.area_ratio(0, 100), 0.0);
    }

    #[test]
    fn test_iou() {
        let a = det(0.1, 0.1, 0.2, 0.2, 0, 0.9);
        assert!((compute_iou(&a, &a) - 1.0).abs() < 1e-6);
        let far = det(0.7, 0.7, 0.2, 0.2, 0, 0.9);
        assert_eq!(compute_iou(&a, &far), 0.0);
    }

    #[test]
    fn test_nms_is_per_class() {
        let candidates = vec![
            Candidate { detection: det(0.1, 0.1, 0.4, 0.4, 57, 0.8), anchor: 0 },
            Candidate { detection: det(0.11, 0.1, 0.4, 0.4, 57, 0.9), anchor: 1 },
            Candidate { detection: det(0.1, 0.1, 0.4, 0.4, 56, 0.7), anchor: 2 },
        ];
        let kept = non_maximum_suppression(candidates, 0.45);
        let anchors: Vec<usize> = kept.iter().map(|c| c.anchor).collect();
        assert_eq!(anchors, vec![1, 2]);
    }

    #[test]
    fn test_decode_candidates() {
        let input = 320;
        let anchors = num_anchors(input);
        let features = 4 + NUM_CLASSES;
        let mut output = vec![0.0f32; features * anchors];
        // anchor 5: centered box of half the input, class 57 at 0.9
        output[5] = 160.0;
        output[anchors + 5] = 160.0;
        output[2 * anchors + 5] = 160.0;
        output[3 * anchors + 5] = 160.0;
        output[(4 + 57) * anchors + 5] = 0.9;
        // anchor 6: below threshold
        output[(4 + 57) * anchors + 6] = 0.1;

        let candidates = decode_candidates(&output, 0, input, 0.25).unwrap();
        assert_eq!(candidates.len(), 1);
        let d = &candidates[0].detection;
        assert_eq!(candidates[0].anchor, 5);
        assert_eq!(d.class_id, 57);
        assert!((d.x - 0.25).abs() < 1e-6 && (d.width - 0.5).abs() < 1e-6);

        assert!(decode_candidates(&output[1..], 0, input, 0.25).is_err());
    }

    #[test]
    fn test_create_session_missing_model() {
        assert!(matches!(
            create_session(Path::new("/nonexistent/model.onnx")),
            Err(MediaError::ModelNotFound(_))
        ));
    }
}
