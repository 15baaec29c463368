//! Locate: find the frame in each video where the couch fills the most of
//! the picture and record whether one was found.

use couch_media::{
    coco_class_id, download_video, scan_video_for_best_frame, ObjectDetect, ObjectDetector,
};
use couch_models::{DetectionRecord, VideoRecord};
use couch_store::{CatalogStore, DataLayout, DetectionStore};
use tracing::{info, warn, Instrument};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::logging::StageLogger;
use crate::stages::{save_image, StageReport};

const STAGE: &str = "locate";

pub async fn run_locate(config: &PipelineConfig) -> PipelineResult<StageReport> {
    let detector = ObjectDetector::new(config.detection.detector_config())?;
    locate_videos(config, &detector).await
}

/// Scan every catalogued video that has no detection record yet.
pub async fn locate_videos(
    config: &PipelineConfig,
    detector: &dyn ObjectDetect,
) -> PipelineResult<StageReport> {
    let layout = config.layout();
    let target_class = coco_class_id(&config.detection.target_class)?;

    let catalog = CatalogStore::new(layout.catalog()).load().await?;
    let store = DetectionStore::new(layout.detection_store());
    let mut index = store.load().await?;

    info!(
        videos = catalog.len(),
        already_located = index.len(),
        target = %config.detection.target_class,
        "Locate starting"
    );

    let mut report = StageReport::default();
    for video in &catalog {
        let logger = StageLogger::new(&video.id, STAGE);
        if index.contains_key(&video.id) {
            report.skipped += 1;
            continue;
        }

        let outcome = locate_one(config, &layout, detector, target_class, video, &logger)
            .instrument(logger.create_span())
            .await;

        match outcome {
            Ok(record) => {
                store.upsert(&mut index, record).await?;
                report.processed += 1;
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
        "Locate finished"
    );
    Ok(report)
}

async fn locate_one(
    config: &PipelineConfig,
    layout: &DataLayout,
    detector: &dyn ObjectDetect,
    target_class: usize,
    video: &VideoRecord,
    logger: &StageLogger,
) -> PipelineResult<DetectionRecord> {
    let video_path = layout.video(&video.id);

    logger.log_start("downloading video");
    download_video(&video.url, &video_path, &config.video_format).await?;

    logger.log_progress("scanning frames");
    let scan = scan_video_for_best_frame(
        &video_path,
        config.detection.frame_interval,
        detector,
        target_class,
        config.detection.confidence_threshold,
    )
    .await;

    if !config.keep_videos {
        if let Err(e) = tokio::fs::remove_file(&video_path).await {
            warn!(video_id = %video.id, "Failed to delete video {}: {}", video_path.display(), e);
        }
    }

    match scan? {
        Some(best) => {
            let frame_path = layout.best_frame(&video.id);
            save_image(&best.frame, &frame_path).await?;
            logger.log_completion(&format!(
                "frame {} saved (ratio {:.3}, confidence {:.2})",
                best.frame_index, best.ratio, best.confidence
            ));
            Ok(DetectionRecord::detected(
                video.id.clone(),
                DataLayout::display_path(&frame_path),
            ))
        }
        None => {
            logger.log_completion("no qualifying detection");
            Ok(DetectionRecord::not_detected(video.id.clone()))
        }
    }
}
