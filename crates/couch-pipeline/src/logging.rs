//! Structured per-video logging for pipeline stages.
//!
//! Every event carries the `stage` and `video_id` fields so one video can be
//! followed across stages in the JSON log output.

use couch_models::VideoId;
use tracing::{error, info, warn, Span};

/// Logger bound to one stage and one video.
#[derive(Debug, Clone)]
pub struct StageLogger {
    video_id: String,
    stage: String,
}

impl StageLogger {
    /// Create a logger for `video_id` within `stage` (e.g. "locate", "label").
    pub fn new(video_id: &VideoId, stage: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Create a logger from a plain string id.
    pub fn from_string(video_id: &str, stage: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            stage = %self.stage,
            "Video started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            stage = %self.stage,
            "Video progress: {}", message
        );
    }

    /// Log a video that was left alone this run.
    pub fn log_skip(&self, reason: &str) {
        info!(
            video_id = %self.video_id,
            stage = %self.stage,
            "Video skipped: {}", reason
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            video_id = %self.video_id,
            stage = %self.stage,
            "Video warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            video_id = %self.video_id,
            stage = %self.stage,
            "Video error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            stage = %self.stage,
            "Video completed: {}", message
        );
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span that wraps all work on this video.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "video",
            video_id = %self.video_id,
            stage = %self.stage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_logger_creation() {
        let logger = StageLogger::new(&VideoId::from("abc"), "segment");
        assert_eq!(logger.video_id(), "abc");
        assert_eq!(logger.stage(), "segment");
    }

    #[test]
    fn test_stage_logger_from_string() {
        let logger = StageLogger::from_string("xyz", "label");
        assert_eq!(logger.video_id(), "xyz");
        assert_eq!(logger.stage(), "label");
    }

    #[test]
    fn test_logging_methods_do_not_panic() {
        let logger = StageLogger::from_string("abc", "locate");
        logger.log_start("scanning");
        logger.log_progress("frame 100");
        logger.log_skip("already detected");
        logger.log_warning("slow download");
        logger.log_error("ffmpeg exited");
        logger.log_completion("done");
        let _span = logger.create_span();
    }
}
