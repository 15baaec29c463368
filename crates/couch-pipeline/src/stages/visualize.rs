//! Colour visualisations over the segmented couches.
//!
//! Strips, composite, grid and families re-cluster each segmented image; the
//! swatch reads the stored colour lists; the scroll GIF animates the family
//! composite.

use std::path::{Path, PathBuf};

use couch_media::{
    encode_scroll_gif, extract_palette, grid, proportional_square, stack_vertically, swatch,
    weighted_strip, Palette, PaletteConfig,
};
use couch_models::{ColorFamily, Hsv, Rgb, VideoId};
use couch_store::{write_atomic, DataLayout, DetectionStore, RecordDir};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::StageLogger;
use crate::stages::{load_rgb, save_image, StageReport};

const STAGE: &str = "visualize";

/// One couch reduced to a palette, with its dominant colour.
struct CouchPalette {
    video_id: VideoId,
    palette: Palette,
    dominant: Hsv,
}

/// Segmented images on disk, sorted by id.
async fn segmented_images(layout: &DataLayout) -> PipelineResult<Vec<(VideoId, PathBuf)>> {
    let dir = layout.segmented_dir();
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut images = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jpg") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            images.push((VideoId::from(stem), path));
        }
    }
    images.sort();
    Ok(images)
}

/// Cluster every segmented image into `k` colours. Images that cannot be
/// clustered are logged and left out.
async fn couch_palettes(
    layout: &DataLayout,
    k: usize,
    palette_config: &PaletteConfig,
) -> PipelineResult<Vec<CouchPalette>> {
    let mut palettes = Vec::new();
    for (video_id, path) in segmented_images(layout).await? {
        match palette_for(&path, k, palette_config).await {
            Ok(palette) => {
                if let Some(dominant) = palette.dominant_hsv() {
                    palettes.push(CouchPalette {
                        video_id,
                        palette,
                        dominant,
                    });
                }
            }
            Err(e) => StageLogger::new(&video_id, STAGE).log_warning(&e.to_string()),
        }
    }
    Ok(palettes)
}

async fn palette_for(path: &Path, k: usize, config: &PaletteConfig) -> PipelineResult<Palette> {
    let img = load_rgb(path).await?;
    Ok(extract_palette(&img, k, config)?)
}

fn require_any<T>(items: &[T], what: &str) -> PipelineResult<()> {
    if items.is_empty() {
        return Err(PipelineError::nothing_to_render(format!(
            "no segmented couches for the {}",
            what
        )));
    }
    Ok(())
}

/// One weighted five-colour strip per segmented image, skipping existing strips.
pub async fn render_strips(config: &PipelineConfig) -> PipelineResult<StageReport> {
    let layout = config.layout();
    let render = &config.render;
    let palette_config = config.segmentation.palette_config();

    let mut report = StageReport::default();
    for (video_id, path) in segmented_images(&layout).await? {
        let out = layout.strip(&video_id);
        if out.exists() {
            report.skipped += 1;
            continue;
        }

        let logger = StageLogger::new(&video_id, STAGE);
        let result = async {
            let palette = palette_for(&path, render.strip_clusters, &palette_config).await?;
            let strip = weighted_strip(&palette, render.strip_width, render.strip_height)?;
            save_image(&strip, &out).await
        }
        .await;

        match result {
            Ok(()) => report.processed += 1,
            Err(e) => {
                report.failed += 1;
                logger.log_warning(&format!("strip not rendered: {}", e));
            }
        }
    }

    info!(
        processed = report.processed,
        skipped = report.skipped,
        failed = report.failed,
        "Strips finished"
    );
    Ok(report)
}

/// One dominant-colour row per couch, sorted by (h, s, v), stacked.
pub async fn render_composite(config: &PipelineConfig) -> PipelineResult<PathBuf> {
    let layout = config.layout();
    let render = &config.render;

    let mut couches = couch_palettes(&layout, 1, &config.segmentation.palette_config()).await?;
    require_any(&couches, "composite")?;
    couches.sort_by(|a, b| a.dominant.cmp_hsv(&b.dominant));

    let strips = couches
        .iter()
        .map(|c| weighted_strip(&c.palette, render.composite_width, render.composite_height))
        .collect::<Result<Vec<_>, _>>()?;
    let composite = stack_vertically(&strips)?;

    let out = layout.composite();
    save_image(&composite, &out).await?;
    info!(couches = couches.len(), path = %out.display(), "Composite written");
    Ok(out)
}

/// One square per couch, sorted by (h, s, v), laid out in a fixed-width grid.
pub async fn render_grid(config: &PipelineConfig) -> PipelineResult<PathBuf> {
    let layout = config.layout();
    let render = &config.render;

    let mut couches = couch_palettes(&layout, 1, &config.segmentation.palette_config()).await?;
    require_any(&couches, "grid")?;
    couches.sort_by(|a, b| a.dominant.cmp_hsv(&b.dominant));

    let squares = couches
        .iter()
        .map(|c| proportional_square(&c.palette, render.grid_square))
        .collect::<Result<Vec<_>, _>>()?;
    let image = grid(&squares, render.grid_columns)?;

    let out = layout.grid();
    save_image(&image, &out).await?;
    info!(couches = couches.len(), path = %out.display(), "Grid written");
    Ok(out)
}

/// Five-colour rows grouped by the family of the dominant colour.
///
/// Rows sort by family label text, then hue, then value.
pub async fn render_families(config: &PipelineConfig) -> PipelineResult<PathBuf> {
    let layout = config.layout();
    let render = &config.render;

    let mut couches = couch_palettes(
        &layout,
        render.family_clusters,
        &config.segmentation.palette_config(),
    )
    .await?;
    require_any(&couches, "family composite")?;
    couches.sort_by(|a, b| {
        let fa = ColorFamily::from_hsv(a.dominant).label();
        let fb = ColorFamily::from_hsv(b.dominant).label();
        fa.cmp(fb).then_with(|| a.dominant.cmp_hue_value(&b.dominant))
    });

    for c in &couches {
        debug!(
            video_id = %c.video_id,
            family = ColorFamily::from_hsv(c.dominant).label(),
            "Family assigned"
        );
    }

    let strips = couches
        .iter()
        .map(|c| weighted_strip(&c.palette, render.family_width, render.family_height))
        .collect::<Result<Vec<_>, _>>()?;
    let composite = stack_vertically(&strips)?;

    let out = layout.families();
    save_image(&composite, &out).await?;
    info!(couches = couches.len(), path = %out.display(), "Family composite written");
    Ok(out)
}

/// Every stored hex colour of detected couches, sorted by (h, s, v), as one strip.
pub async fn render_swatch(config: &PipelineConfig) -> PipelineResult<PathBuf> {
    let layout = config.layout();
    let render = &config.render;

    let index = DetectionStore::new(layout.detection_store()).load().await?;
    let hex_values: RecordDir<Vec<String>> = RecordDir::new(layout.hex_values_dir());

    let mut colors = Vec::new();
    for record in index.values().filter(|r| r.couch_detected) {
        match hex_values.read(&record.video_id).await? {
            Some(hex) => {
                for value in hex {
                    colors.push(Rgb::from_hex(&value)?);
                }
            }
            None => warn!(video_id = %record.video_id, "No hex values stored"),
        }
    }
    if colors.is_empty() {
        return Err(PipelineError::nothing_to_render("no stored hex colours for the swatch"));
    }

    colors.sort_by(|a, b| a.to_hsv().cmp_hsv(&b.to_hsv()));
    let image = swatch(&colors, render.swatch_width, render.swatch_height)?;

    let out = layout.swatch();
    save_image(&image, &out).await?;
    info!(colours = colors.len(), path = %out.display(), "Swatch written");
    Ok(out)
}

/// Scrolling GIF over the family composite.
pub async fn render_scroll(config: &PipelineConfig) -> PipelineResult<PathBuf> {
    let layout = config.layout();
    let source = layout.families();
    let image = load_rgb(&source).await?;

    let gif = encode_scroll_gif(&image, &config.render.scroll)?;
    let out = layout.scroll_gif();
    write_atomic(&out, &gif).await?;

    info!(
        source = %source.display(),
        path = %out.display(),
        bytes = gif.len(),
        "Scroll GIF written"
    );
    Ok(out)
}
