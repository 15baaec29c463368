//! YOLOv8 bounding-box detector.

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::{
    create_session, decode_candidates, non_maximum_suppression, preprocess, ObjectDetect,
    ObjectDetection,
};
use crate::error::{MediaError, MediaResult};

/// Configuration for object detection.
#[derive(Debug, Clone)]
pub struct ObjectDetectorConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Minimum class score kept before NMS
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for ObjectDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// Object detector using a YOLOv8 ONNX model.
pub struct ObjectDetector {
    session: Mutex<Session>,
    config: ObjectDetectorConfig,
}

impl ObjectDetector {
    /// Load the model. Fails if the file is missing or unreadable.
    pub fn new(config: ObjectDetectorConfig) -> MediaResult<Self> {
        let session = Mutex::new(create_session(Path::new(&config.model_path))?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            "Object detector initialized"
        );
        Ok(Self { session, config })
    }

    /// Run ONNX inference and copy out `output0`.
    fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        // [1, 84, anchors]
        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::internal("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::internal(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.to_vec())
    }

    pub fn config(&self) -> &ObjectDetectorConfig {
        &self.config
    }
}

impl ObjectDetect for ObjectDetector {
    fn detect(&self, frame: &RgbImage) -> MediaResult<Vec<ObjectDetection>> {
        let input = preprocess(frame, self.config.input_size)?;
        let output = self.run_inference(input)?;

        let candidates = decode_candidates(
            &output,
            0,
            self.config.input_size,
            self.config.confidence_threshold,
        )?;
        let detections: Vec<ObjectDetection> =
            non_maximum_suppression(candidates, self.config.nms_threshold)
                .into_iter()
                .map(|c| c.detection)
                .collect();

        debug!(count = detections.len(), "Object detection completed");
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ObjectDetectorConfig::default();
        assert_eq!(config.input_size, 640);
        assert_eq!(config.model_path, "models/yolov8n.onnx");
        assert!((config.nms_threshold - 0.45).abs() < 0.001);
    }

    #[test]
    fn test_missing_model_is_reported() {
        let config = ObjectDetectorConfig {
            model_path: "/nonexistent/yolov8n.onnx".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ObjectDetector::new(config),
            Err(MediaError::ModelNotFound(_))
        ));
    }
}
