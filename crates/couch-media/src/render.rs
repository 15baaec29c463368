//! Colour strips, squares, stacks, grids and swatches.

use couch_models::Rgb;
use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;

use crate::error::{MediaError, MediaResult};
use crate::palette::Palette;

fn pixel(color: &Rgb) -> image::Rgb<u8> {
    image::Rgb(color.to_u8())
}

fn require_palette(palette: &Palette) -> MediaResult<()> {
    if palette.is_empty() {
        return Err(MediaError::invalid_image("palette has no colours"));
    }
    Ok(())
}

/// Horizontal strip where each colour takes `floor(width * proportion)` columns.
///
/// Columns left over after rounding stay black.
pub fn weighted_strip(palette: &Palette, width: u32, height: u32) -> MediaResult<RgbImage> {
    require_palette(palette)?;

    let mut img = RgbImage::new(width, height);
    let mut start = 0u32;
    for entry in palette.entries() {
        let span = (width as f64 * entry.proportion).floor() as u32;
        let end = (start + span).min(width);
        let color = pixel(&entry.color);
        for x in start..end {
            for y in 0..height {
                img.put_pixel(x, y, color);
            }
        }
        start = end;
    }
    Ok(img)
}

/// Square filled top to bottom, `floor(size * proportion)` rows per colour.
pub fn proportional_square(palette: &Palette, size: u32) -> MediaResult<RgbImage> {
    require_palette(palette)?;

    let mut img = RgbImage::new(size, size);
    let mut start = 0u32;
    for entry in palette.entries() {
        let span = (size as f64 * entry.proportion).floor() as u32;
        let end = (start + span).min(size);
        let color = pixel(&entry.color);
        for y in start..end {
            for x in 0..size {
                img.put_pixel(x, y, color);
            }
        }
        start = end;
    }
    Ok(img)
}

/// Stack equally wide images top to bottom.
pub fn stack_vertically(images: &[RgbImage]) -> MediaResult<RgbImage> {
    let first = images
        .first()
        .ok_or_else(|| MediaError::invalid_image("nothing to stack"))?;
    let width = first.width();
    if let Some(bad) = images.iter().find(|i| i.width() != width) {
        return Err(MediaError::invalid_image(format!(
            "cannot stack width {} onto width {}",
            bad.width(),
            width
        )));
    }

    let height: u32 = images.iter().map(RgbImage::height).sum();
    let mut out = RgbImage::new(width, height);
    let mut y = 0i64;
    for img in images {
        image::imageops::replace(&mut out, img, 0, y);
        y += img.height() as i64;
    }
    Ok(out)
}

/// Lay out equally sized tiles row-major in `columns` columns.
///
/// The last row may be partially filled; empty cells stay black.
pub fn grid(tiles: &[RgbImage], columns: u32) -> MediaResult<RgbImage> {
    let first = tiles
        .first()
        .ok_or_else(|| MediaError::invalid_image("nothing to lay out"))?;
    if columns == 0 {
        return Err(MediaError::invalid_image("grid needs at least one column"));
    }
    let (tile_w, tile_h) = first.dimensions();
    if tiles.iter().any(|t| t.dimensions() != (tile_w, tile_h)) {
        return Err(MediaError::invalid_image("grid tiles differ in size"));
    }

    let rows = (tiles.len() as u32).div_ceil(columns);
    let mut out = RgbImage::new(columns * tile_w, rows * tile_h);
    for (i, tile) in tiles.iter().enumerate() {
        let i = i as u32;
        let x = (i % columns) * tile_w;
        let y = (i / columns) * tile_h;
        image::imageops::replace(&mut out, tile, x as i64, y as i64);
    }
    Ok(out)
}

/// Equal-width bands of the given colours across a `width x height` raster.
pub fn swatch(colors: &[Rgb], width: u32, height: u32) -> MediaResult<RgbImage> {
    if colors.is_empty() {
        return Err(MediaError::invalid_image("no colours for swatch"));
    }

    let n = colors.len() as u64;
    let bands: Vec<image::Rgb<u8>> = colors.iter().map(pixel).collect();
    Ok(RgbImage::from_fn(width, height, |x, _| {
        let idx = (x as u64 * n / width.max(1) as u64).min(n - 1);
        bands[idx as usize]
    }))
}

/// Encode for the format implied by `path`'s extension.
pub fn encode_for_path(img: &RgbImage, path: &Path) -> MediaResult<Vec<u8>> {
    let format = ImageFormat::from_path(path)?;
    encode_image(img, format)
}

pub fn encode_image(img: &RgbImage, format: ImageFormat) -> MediaResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone()).write_to(&mut buf, ImageOutputFormat::from(format))?;
    Ok(buf.into_inner())
}
