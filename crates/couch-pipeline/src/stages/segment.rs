//! Segment: cut the couch out of each best frame and store its colours.

use std::path::Path;

use couch_media::{
    apply_mask, coco_class_id, extract_palette, InstanceMask, InstanceSegment, PaletteConfig,
    Segmenter,
};
use couch_models::DetectionRecord;
use couch_store::{DataLayout, DetectionStore, RecordDir};
use tracing::{info, Instrument};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::logging::StageLogger;
use crate::stages::{load_rgb, save_image, StageReport};

const STAGE: &str = "segment";

/// Outcome for one video.
enum Segmented {
    Written(usize),
    NoInstance,
}

pub async fn run_segment(config: &PipelineConfig) -> PipelineResult<StageReport> {
    let segmenter = Segmenter::new(
        config
            .segmentation
            .segmenter_config(config.detection.nms_threshold, config.detection.input_size),
    )?;
    segment_couches(config, &segmenter).await
}

/// Segment every detected couch whose masked image or colour list is missing.
pub async fn segment_couches(
    config: &PipelineConfig,
    segmenter: &dyn InstanceSegment,
) -> PipelineResult<StageReport> {
    let layout = config.layout();
    let target_class = coco_class_id(&config.detection.target_class)?;
    let palette_config = config.segmentation.palette_config();
    let hex_values: RecordDir<Vec<String>> = RecordDir::new(layout.hex_values_dir());

    let index = DetectionStore::new(layout.detection_store()).load().await?;
    let mut report = StageReport::default();

    for record in index.values() {
        let Some(image_path) = record.detected_image() else {
            continue;
        };
        let logger = StageLogger::new(&record.video_id, STAGE);

        if layout.segmented(&record.video_id).exists() && hex_values.exists(&record.video_id) {
            report.skipped += 1;
            logger.log_skip("segmented image and hex values already exist");
            continue;
        }

        let outcome = segment_one(
            &layout,
            segmenter,
            target_class,
            config.segmentation.clusters,
            &palette_config,
            &hex_values,
            record,
            image_path,
        )
        .instrument(logger.create_span())
        .await;

        match outcome {
            Ok(Segmented::Written(k)) => {
                report.processed += 1;
                logger.log_completion(&format!("{} colours stored", k));
            }
            Ok(Segmented::NoInstance) => {
                report.skipped += 1;
                logger.log_skip("couch not found in image");
            }
            Err(e) => {
                report.failed += 1;
                logger.log_error(&e.to_string());
            }
        }
    }

    info!(
        processed = report.processed,
        skipped = report.skipped,
        failed = report.failed,
        "Segment finished"
    );
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
async fn segment_one(
    layout: &DataLayout,
    segmenter: &dyn InstanceSegment,
    target_class: usize,
    clusters: usize,
    palette_config: &PaletteConfig,
    hex_values: &RecordDir<Vec<String>>,
    record: &DetectionRecord,
    image_path: &str,
) -> PipelineResult<Segmented> {
    let frame = load_rgb(Path::new(image_path)).await?;
    let instances = segmenter.segment(&frame)?;

    let Some(instance) = best_instance(&instances, target_class) else {
        return Ok(Segmented::NoInstance);
    };

    let masked = apply_mask(&frame, &instance.mask)?;
    let palette = extract_palette(&masked, clusters, palette_config)?;

    save_image(&masked, &layout.segmented(&record.video_id)).await?;
    let hex = palette.hex_colors();
    hex_values.write(&record.video_id, &hex).await?;

    Ok(Segmented::Written(hex.len()))
}

/// Highest-confidence instance of the target class; the first one wins ties.
fn best_instance(instances: &[InstanceMask], target_class: usize) -> Option<&InstanceMask> {
    instances
        .iter()
        .filter(|i| i.detection.class_id == target_class)
        .fold(None, |best: Option<&InstanceMask>, i| match best {
            Some(b) if b.detection.confidence >= i.detection.confidence => Some(b),
            _ => Some(i),
        })
}
