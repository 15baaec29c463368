//! Colour classifications and the joined dataset table.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::detection::DetectionIndex;
use crate::video::VideoId;

/// Structured output requested from the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CouchColourLabel {
    /// The classified color of the couch
    pub couch_colour: String,
}

/// Persisted classification for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColorClassification {
    pub couch_colour: String,
    pub video_id: VideoId,
}

impl ColorClassification {
    pub fn new(video_id: VideoId, label: CouchColourLabel) -> Self {
        Self {
            couch_colour: label.couch_colour,
            video_id,
        }
    }
}

/// One row of the aggregated table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JoinedRecord {
    pub video_id: VideoId,
    pub couch_detected: bool,
    pub image_path: Option<String>,
    pub couch_colour: Option<String>,
}

/// Frequency of one normalised colour label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LabelCount {
    pub couch_colour: String,
    pub count: usize,
}

/// Left join anchored on detection records.
///
/// Every detection record yields exactly one row, in index order.
/// Classifications without a detection record are dropped.
pub fn left_join(
    detections: &DetectionIndex,
    classifications: impl IntoIterator<Item = ColorClassification>,
) -> Vec<JoinedRecord> {
    let labels: HashMap<VideoId, String> = classifications
        .into_iter()
        .map(|c| (c.video_id, c.couch_colour))
        .collect();

    detections
        .values()
        .map(|d| JoinedRecord {
            video_id: d.video_id.clone(),
            couch_detected: d.couch_detected,
            image_path: d.image_path.clone(),
            couch_colour: labels.get(&d.video_id).cloned(),
        })
        .collect()
}

/// Lowercase, trim and fold the American spelling of grey.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace("gray", "grey")
}

/// Count normalised labels, most frequent first (ties by label).
pub fn summarize_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<LabelCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(normalize_label(label)).or_default() += 1;
    }

    let mut summary: Vec<LabelCount> = counts
        .into_iter()
        .map(|(couch_colour, count)| LabelCount { couch_colour, count })
        .collect();
    summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.couch_colour.cmp(&b.couch_colour)));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionRecord;

    fn classification(id: &str, colour: &str) -> ColorClassification {
        ColorClassification {
            couch_colour: colour.to_string(),
            video_id: VideoId::from(id),
        }
    }

    #[test]
    fn test_left_join_keeps_unmatched_detections() {
        let mut index = DetectionIndex::new();
        index.insert(
            VideoId::from("a"),
            DetectionRecord::detected(VideoId::from("a"), "data/couch_images/a_couch.jpg"),
        );
        index.insert(VideoId::from("b"), DetectionRecord::not_detected(VideoId::from("b")));

        let rows = left_join(
            &index,
            vec![classification("a", "grey"), classification("zzz", "red")],
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].video_id.as_str(), "a");
        assert_eq!(rows[0].couch_colour.as_deref(), Some("grey"));
        assert_eq!(rows[1].video_id.as_str(), "b");
        assert!(rows[1].couch_colour.is_none());
        assert!(rows.iter().all(|r| r.video_id.as_str() != "zzz"));
    }

    #[test]
    fn test_joined_null_colour_serializes() {
        let row = JoinedRecord {
            video_id: VideoId::from("b"),
            couch_detected: false,
            image_path: None,
            couch_colour: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert!(json["couch_colour"].is_null());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Gray "), "grey");
        assert_eq!(normalize_label("Dark Gray"), "dark grey");
        assert_eq!(normalize_label("Beige"), "beige");
    }

    #[test]
    fn test_summarize_labels_orders_by_count() {
        let summary = summarize_labels(["Grey", "gray", "white", "Beige", "beige", "grey"]);
        assert_eq!(summary[0], LabelCount { couch_colour: "grey".into(), count: 3 });
        assert_eq!(summary[1], LabelCount { couch_colour: "beige".into(), count: 2 });
        assert_eq!(summary[2], LabelCount { couch_colour: "white".into(), count: 1 });
    }

    #[test]
    fn test_label_schema_forbids_extra_fields() {
        let schema = serde_json::to_value(schemars::schema_for!(CouchColourLabel)).unwrap();
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"][0], "couch_colour");
    }
}
