//! Pick the sampled frame where the target object fills the most of the picture.

use image::RgbImage;
use std::path::Path;
use tracing::{debug, info};

use super::{ObjectDetect, ObjectDetection};
use crate::error::MediaResult;
use crate::frames::FrameSampler;

/// Winning frame of a scan.
#[derive(Debug, Clone)]
pub struct BestFrame<F> {
    pub frame: F,
    pub frame_index: u64,
    /// Box area over frame area, in (0, 1]
    pub ratio: f64,
    pub confidence: f32,
}

/// Running maximum over sampled frames.
///
/// Per frame only the highest-confidence detection of the target class
/// above the threshold counts. A frame replaces the current best only when
/// its ratio is strictly greater, so earlier frames win ties.
#[derive(Debug)]
pub struct BestFrameTracker<F> {
    target_class: usize,
    confidence_threshold: f32,
    best: Option<BestFrame<F>>,
    frames_seen: u64,
}

impl<F> BestFrameTracker<F> {
    pub fn new(target_class: usize, confidence_threshold: f32) -> Self {
        Self {
            target_class,
            confidence_threshold,
            best: None,
            frames_seen: 0,
        }
    }

    /// Detection of the target class that represents this frame, if any.
    pub fn frame_candidate<'a>(&self, detections: &'a [ObjectDetection]) -> Option<&'a ObjectDetection> {
        detections
            .iter()
            .filter(|d| d.class_id == self.target_class && d.confidence > self.confidence_threshold)
            .fold(None, |best: Option<&ObjectDetection>, d| match best {
                Some(b) if b.confidence >= d.confidence => Some(b),
                _ => Some(d),
            })
    }

    /// Feed one frame. Returns true when it became the new best.
    pub fn observe(
        &mut self,
        frame_index: u64,
        frame_width: u32,
        frame_height: u32,
        detections: &[ObjectDetection],
        frame: F,
    ) -> bool {
        self.frames_seen += 1;

        let Some(candidate) = self.frame_candidate(detections) else {
            return false;
        };
        let ratio = candidate.area_ratio(frame_width, frame_height);
        let confidence = candidate.confidence;

        let current = self.best.as_ref().map(|b| b.ratio).unwrap_or(0.0);
        if ratio <= current {
            return false;
        }

        self.best = Some(BestFrame {
            frame,
            frame_index,
            ratio,
            confidence,
        });
        true
    }

    pub fn best(&self) -> Option<&BestFrame<F>> {
        self.best.as_ref()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn finish(self) -> Option<BestFrame<F>> {
        self.best
    }
}

/// Sample every `stride`-th frame of a video and keep the best one.
pub async fn scan_video_for_best_frame(
    video_path: impl AsRef<Path>,
    stride: u64,
    detector: &dyn ObjectDetect,
    target_class: usize,
    confidence_threshold: f32,
) -> MediaResult<Option<BestFrame<RgbImage>>> {
    let video_path = video_path.as_ref();
    let mut sampler = FrameSampler::open(video_path, stride).await?;
    let (width, height) = sampler.dimensions();
    debug!(
        video = %video_path.display(),
        expected_samples = sampler.info().estimated_samples(stride),
        "Scanning video for best frame"
    );
    let mut tracker = BestFrameTracker::new(target_class, confidence_threshold);

    while let Some(sampled) = sampler.next_frame().await? {
        let detections = detector.detect(&sampled.image)?;
        if tracker.observe(sampled.index, width, height, &detections, sampled.image) {
            if let Some(best) = tracker.best() {
                debug!(
                    frame = best.frame_index,
                    ratio = best.ratio,
                    confidence = best.confidence,
                    "New best frame"
                );
            }
        }
    }

    info!(
        video = %video_path.display(),
        frames_sampled = tracker.frames_seen(),
        found = tracker.best().is_some(),
        "Frame scan finished"
    );

    Ok(tracker.finish())
}
