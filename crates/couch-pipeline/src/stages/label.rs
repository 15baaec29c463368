//! Label: ask the hosted model for the colour of every detected couch.

use couch_labeler::{image_url_for, ColorLabeler, OpenAiLabeler};
use couch_models::ColorClassification;
use couch_store::{DetectionStore, RecordDir};
use tracing::{info, Instrument};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::logging::StageLogger;
use crate::stages::StageReport;

const STAGE: &str = "label";

pub async fn run_label(config: &PipelineConfig) -> PipelineResult<StageReport> {
    let labeler = OpenAiLabeler::new(config.labeler.labeler_config()?)?;
    label_couches(config, &labeler).await
}

/// Classify detected couches that have no classification file yet.
///
/// `limit` bounds the number of detected couches considered, counting those
/// skipped because they are already classified.
pub async fn label_couches(
    config: &PipelineConfig,
    labeler: &dyn ColorLabeler,
) -> PipelineResult<StageReport> {
    let layout = config.layout();
    let index = DetectionStore::new(layout.detection_store()).load().await?;
    let classifications: RecordDir<ColorClassification> =
        RecordDir::new(layout.classifications_dir());

    let detected: Vec<_> = index.values().filter(|r| r.couch_detected).collect();
    info!(couches = detected.len(), limit = ?config.labeler.limit, "Label starting");

    let mut report = StageReport::default();
    for (considered, record) in detected.into_iter().enumerate() {
        if let Some(limit) = config.labeler.limit {
            if considered >= limit {
                info!(limit, "Label limit reached, stopping");
                break;
            }
        }

        let logger = StageLogger::new(&record.video_id, STAGE);
        if classifications.exists(&record.video_id) {
            report.skipped += 1;
            continue;
        }

        let image_url = image_url_for(&config.labeler.image_url_template, record.video_id.as_str());
        logger.log_start(&image_url);

        let outcome = labeler
            .classify(&image_url)
            .instrument(logger.create_span())
            .await;

        match outcome {
            Ok(label) => {
                let classification = ColorClassification::new(record.video_id.clone(), label);
                classifications.write(&record.video_id, &classification).await?;
                report.processed += 1;
                logger.log_completion(&classification.couch_colour);
            }
            Err(e) => {
                report.failed += 1;
                logger.log_error(&format!("{} (transient: {})", e, e.is_transient()));
            }
        }
    }

    info!(
        processed = report.processed,
        skipped = report.skipped,
        failed = report.failed,
        "Label finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use couch_labeler::{LabelerError, LabelerResult};
    use couch_models::{CouchColourLabel, DetectionRecord, VideoId};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every URL and fails for ids containing "bad".
    #[derive(Default)]
    struct FakeLabeler {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ColorLabeler for FakeLabeler {
        async fn classify(&self, image_url: &str) -> LabelerResult<CouchColourLabel> {
            self.calls.lock().unwrap().push(image_url.to_string());
            if image_url.contains("bad") {
                return Err(LabelerError::Api {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(CouchColourLabel {
                couch_colour: "grey".into(),
            })
        }
    }

    async fn setup(dir: &TempDir, ids: &[(&str, bool)]) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.paths.data_dir = dir.path().to_path_buf();
        config.labeler.image_url_template = "https://img/{video_id}.jpg".to_string();

        let store = DetectionStore::new(config.layout().detection_store());
        let mut index = store.load().await.unwrap();
        for (id, detected) in ids {
            let record = if *detected {
                DetectionRecord::detected(VideoId::from(*id), format!("data/couch_images/{}_couch.jpg", id))
            } else {
                DetectionRecord::not_detected(VideoId::from(*id))
            };
            store.upsert(&mut index, record).await.unwrap();
        }
        config
    }

    #[tokio::test]
    async fn test_only_detected_couches_are_labeled() {
        let dir = TempDir::new().unwrap();
        let config = setup(&dir, &[("a", true), ("b", false), ("c", true)]).await;
        let labeler = FakeLabeler::default();

        let report = label_couches(&config, &labeler).await.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(
            *labeler.calls.lock().unwrap(),
            vec!["https://img/a.jpg".to_string(), "https://img/c.jpg".to_string()]
        );
    }

    #[tokio::test]
    async fn test_limit_counts_skipped_couches() {
        let dir = TempDir::new().unwrap();
        let mut config = setup(&dir, &[("a", true), ("b", true), ("c", true)]).await;

        let labeler = FakeLabeler::default();
        config.labeler.limit = Some(1);
        label_couches(&config, &labeler).await.unwrap();

        // "a" is already labeled and still counts against the limit
        let report = label_couches(&config, &labeler).await.unwrap();
        assert_eq!(report, StageReport { processed: 0, skipped: 1, failed: 0 });

        config.labeler.limit = Some(2);
        let report = label_couches(&config, &labeler).await.unwrap();
        assert_eq!(report, StageReport { processed: 1, skipped: 1, failed: 0 });
        assert_eq!(labeler.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_leaves_video_unlabeled() {
        let dir = TempDir::new().unwrap();
        let config = setup(&dir, &[("bad", true), ("good", true)]).await;
        let labeler = FakeLabeler::default();

        let report = label_couches(&config, &labeler).await.unwrap();
        assert_eq!(report, StageReport { processed: 1, skipped: 0, failed: 1 });

        let dir_records: RecordDir<ColorClassification> =
            RecordDir::new(config.layout().classifications_dir());
        assert!(!dir_records.exists(&VideoId::from("bad")));
        assert!(dir_records.exists(&VideoId::from("good")));
    }
}
