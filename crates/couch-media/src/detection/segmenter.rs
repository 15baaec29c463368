//! YOLOv8-seg instance segmentation.

use std::path::Path;
use std::sync::Mutex;

use image::{GrayImage, Luma, RgbImage};
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::{
    create_session, decode_candidates, non_maximum_suppression, preprocess, InstanceSegment,
    ObjectDetection,
};
use crate::error::{MediaError, MediaResult};

/// Mask coefficients per candidate in `output0`.
const MASK_COEFFICIENTS: usize = 32;

/// Configuration for instance segmentation.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub model_path: String,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub input_size: u32,
    /// Mask probability above which a pixel belongs to the instance
    pub mask_threshold: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n-seg.onnx".to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
            mask_threshold: 0.5,
        }
    }
}

/// One segmented instance with a binary mask (0 or 255) at source resolution.
#[derive(Debug, Clone)]
pub struct InstanceMask {
    pub detection: ObjectDetection,
    pub mask: GrayImage,
}

impl InstanceMask {
    /// Number of pixels inside the mask.
    pub fn coverage(&self) -> usize {
        self.mask.pixels().filter(|p| p[0] > 0).count()
    }
}

/// Instance segmenter using a YOLOv8-seg ONNX model.
pub struct Segmenter {
    session: Mutex<Session>,
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> MediaResult<Self> {
        let session = Mutex::new(create_session(Path::new(&config.model_path))?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            "Segmenter initialized"
        );
        Ok(Self { session, config })
    }

    /// Returns `(output0, output1)` flattened.
    fn run_inference(&self, input: Value) -> MediaResult<(Vec<f32>, Vec<f32>)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let extract = |name: &str| -> MediaResult<Vec<f32>> {
            let output = outputs
                .get(name)
                .ok_or_else(|| MediaError::internal(format!("Missing {} tensor", name)))?;
            let tensor = output
                .try_extract_tensor::<f32>()
                .map_err(|e| MediaError::internal(format!("Failed to extract tensor: {}", e)))?;
            Ok(tensor.1.to_vec())
        };

        let boxes = extract("output0")?;
        let protos = extract("output1")?;
        Ok((boxes, protos))
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }
}

impl InstanceSegment for Segmenter {
    fn segment(&self, image: &RgbImage) -> MediaResult<Vec<InstanceMask>> {
        let (width, height) = image.dimensions();
        let input = preprocess(image, self.config.input_size)?;
        let (boxes, protos) = self.run_inference(input)?;

        let proto_size = (self.config.input_size / 4) as usize;
        if protos.len() != MASK_COEFFICIENTS * proto_size * proto_size {
            return Err(MediaError::internal(format!(
                "Unexpected prototype size: expected {}, got {}",
                MASK_COEFFICIENTS * proto_size * proto_size,
                protos.len()
            )));
        }

        let candidates = decode_candidates(
            &boxes,
            MASK_COEFFICIENTS,
            self.config.input_size,
            self.config.confidence_threshold,
        )?;
        let anchors = boxes.len() / (4 + super::NUM_CLASSES + MASK_COEFFICIENTS);

        let mut instances = Vec::new();
        for candidate in non_maximum_suppression(candidates, self.config.nms_threshold) {
            let coefficients: Vec<f32> = (0..MASK_COEFFICIENTS)
                .map(|k| boxes[(4 + super::NUM_CLASSES + k) * anchors + candidate.anchor])
                .collect();
            let mask = build_mask(
                &coefficients,
                &protos,
                proto_size,
                &candidate.detection,
                width,
                height,
                self.config.mask_threshold,
            );
            instances.push(InstanceMask {
                detection: candidate.detection,
                mask,
            });
        }

        debug!(count = instances.len(), "Segmentation completed");
        Ok(instances)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Combine prototypes, crop to the box, upsample bilinearly and binarise.
fn build_mask(
    coefficients: &[f32],
    protos: &[f32],
    proto_size: usize,
    detection: &ObjectDetection,
    width: u32,
    height: u32,
    threshold: f32,
) -> GrayImage {
    let plane = proto_size * proto_size;
    let scale = proto_size as f32;
    let x1 = detection.x * scale;
    let y1 = detection.y * scale;
    let x2 = (detection.x + detection.width) * scale;
    let y2 = (detection.y + detection.height) * scale;

    let mut low_res = vec![0.0f32; plane];
    for py in 0..proto_size {
        let cy = py as f32 + 0.5;
        if cy < y1 || cy >= y2 {
            continue;
        }
        for px in 0..proto_size {
            let cx = px as f32 + 0.5;
            if cx < x1 || cx >= x2 {
                continue;
            }
            let idx = py * proto_size + px;
            let logit: f32 = coefficients
                .iter()
                .enumerate()
                .map(|(k, c)| c * protos[k * plane + idx])
                .sum();
            low_res[idx] = sigmoid(logit);
        }
    }

    let sample = |x: usize, y: usize| low_res[y * proto_size + x];
    let max_index = proto_size.saturating_sub(1) as f32;

    GrayImage::from_fn(width, height, |x, y| {
        let u = ((x as f32 + 0.5) * scale / width as f32 - 0.5).clamp(0.0, max_index);
        let v = ((y as f32 + 0.5) * scale / height as f32 - 0.5).clamp(0.0, max_index);
        let (x0, y0) = (u.floor() as usize, v.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(proto_size - 1), (y0 + 1).min(proto_size - 1));
        let (fx, fy) = (u - x0 as f32, v - y0 as f32);

        let top = sample(x0, y0) * (1.0 - fx) + sample(x1, y0) * fx;
        let bottom = sample(x0, y1) * (1.0 - fx) + sample(x1, y1) * fx;
        let value = top * (1.0 - fy) + bottom * fy;

        Luma([if value > threshold { 255 } else { 0 }])
    })
}

/// Zero every pixel outside the mask.
pub fn apply_mask(image: &RgbImage, mask: &GrayImage) -> MediaResult<RgbImage> {
    if image.dimensions() != mask.dimensions() {
        return Err(MediaError::invalid_image(format!(
            "Mask size {:?} does not match image size {:?}",
            mask.dimensions(),
            image.dimensions()
        )));
    }

    let mut out = image.clone();
    for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
        if m[0] == 0 {
            *pixel = image::Rgb([0, 0, 0]);
        }
    }
    Ok(out)
}
