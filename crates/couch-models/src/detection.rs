//! Per-video detection records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::video::VideoId;

/// Detection store contents, keyed by video id.
pub type DetectionIndex = BTreeMap<VideoId, DetectionRecord>;

/// Whether the target object was found in a video's sampled frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionRecord {
    pub video_id: VideoId,

    pub couch_detected: bool,

    /// Saved best frame; present iff `couch_detected`
    pub image_path: Option<String>,
}

impl DetectionRecord {
    pub fn detected(video_id: VideoId, image_path: impl Into<String>) -> Self {
        Self {
            video_id,
            couch_detected: true,
            image_path: Some(image_path.into()),
        }
    }

    pub fn not_detected(video_id: VideoId) -> Self {
        Self {
            video_id,
            couch_detected: false,
            image_path: None,
        }
    }

    /// Saved frame path when the couch was detected.
    pub fn detected_image(&self) -> Option<&str> {
        if self.couch_detected {
            self.image_path.as_deref()
        } else {
            None
        }
    }
}
