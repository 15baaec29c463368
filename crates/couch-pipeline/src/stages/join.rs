//! Join: one flat table of detections and colour labels, plus label counts.

use couch_models::{left_join, summarize_labels, ColorClassification, JoinedRecord, LabelCount};
use couch_store::{write_json_atomic, DetectionStore, RecordDir};
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;

/// Joined rows and the label summary that were written.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutput {
    pub rows: Vec<JoinedRecord>,
    pub counts: Vec<LabelCount>,
}

pub async fn run_join(config: &PipelineConfig) -> PipelineResult<JoinOutput> {
    let layout = config.layout();

    let detections = DetectionStore::new(layout.detection_store()).load().await?;
    let classifications: RecordDir<ColorClassification> =
        RecordDir::new(layout.classifications_dir());
    let labels = classifications.list().await?;

    let rows = left_join(&detections, labels.into_iter().map(|(_, c)| c));
    let counts = summarize_labels(rows.iter().filter_map(|r| r.couch_colour.as_deref()));

    write_json_atomic(layout.joined(), &rows).await?;
    write_json_atomic(layout.label_counts(), &counts).await?;

    info!(
        rows = rows.len(),
        labeled = rows.iter().filter(|r| r.couch_colour.is_some()).count(),
        distinct_labels = counts.len(),
        "Join finished"
    );
    Ok(JoinOutput { rows, counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use couch_models::{CouchColourLabel, DetectionRecord, VideoId};
    use couch_store::read_json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_join_writes_table_and_counts() {
        let dir = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.paths.data_dir = dir.path().to_path_buf();
        let layout = config.layout();

        let store = DetectionStore::new(layout.detection_store());
        let mut index = store.load().await.unwrap();
        for record in [
            DetectionRecord::detected(VideoId::from("a"), "data/couch_images/a_couch.jpg"),
            DetectionRecord::not_detected(VideoId::from("b")),
            DetectionRecord::detected(VideoId::from("c"), "data/couch_images/c_couch.jpg"),
            DetectionRecord::detected(VideoId::from("d"), "data/couch_images/d_couch.jpg"),
        ] {
            store.upsert(&mut index, record).await.unwrap();
        }

        let labels: RecordDir<ColorClassification> = RecordDir::new(layout.classifications_dir());
        for (id, colour) in [("a", "Gray"), ("c", "grey "), ("d", "beige"), ("zz", "red")] {
            let c = ColorClassification::new(
                VideoId::from(id),
                CouchColourLabel {
                    couch_colour: colour.to_string(),
                },
            );
            labels.write(&VideoId::from(id), &c).await.unwrap();
        }

        let output = run_join(&config).await.unwrap();
        let ids: Vec<&str> = output.rows.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert!(output.rows[1].couch_colour.is_none());
        assert_eq!(output.rows[0].couch_colour.as_deref(), Some("Gray"));

        assert_eq!(
            output.counts,
            vec![
                LabelCount { couch_colour: "grey".into(), count: 2 },
                LabelCount { couch_colour: "beige".into(), count: 1 },
            ]
        );

        let on_disk: Vec<JoinedRecord> = read_json(layout.joined()).await.unwrap().unwrap();
        assert_eq!(on_disk, output.rows);
        let json: serde_json::Value = read_json(layout.joined()).await.unwrap().unwrap();
        assert!(json[1]["couch_colour"].is_null());
    }
}
