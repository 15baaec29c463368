//! Vertical scroll animation over a tall image, encoded as a looping GIF.

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, RgbImage};

use crate::error::{MediaError, MediaResult};

/// Scroll window and pacing.
#[derive(Debug, Clone)]
pub struct ScrollConfig {
    pub window_height: u32,
    pub step: u32,
    pub frame_delay_ms: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            window_height: 150,
            step: 5,
            frame_delay_ms: 100,
        }
    }
}

/// Window offsets `0, step, 2*step, ...` strictly below `height - window`.
pub fn scroll_offsets(height: u32, config: &ScrollConfig) -> MediaResult<Vec<u32>> {
    if config.step == 0 {
        return Err(MediaError::invalid_image("scroll step must be positive"));
    }
    if height <= config.window_height {
        return Err(MediaError::invalid_image(format!(
            "image height {} does not exceed scroll window {}",
            height, config.window_height
        )));
    }
    Ok((0..height - config.window_height)
        .step_by(config.step as usize)
        .collect())
}

/// Crop one window per offset.
pub fn scroll_frames(image: &RgbImage, config: &ScrollConfig) -> MediaResult<Vec<RgbImage>> {
    let offsets = scroll_offsets(image.height(), config)?;
    Ok(offsets
        .into_iter()
        .map(|y| {
            image::imageops::crop_imm(image, 0, y, image.width(), config.window_height).to_image()
        })
        .collect())
}

/// Encode the scroll animation as an infinitely looping GIF.
pub fn encode_scroll_gif(image: &RgbImage, config: &ScrollConfig) -> MediaResult<Vec<u8>> {
    let frames = scroll_frames(image, config)?;
    let delay = Delay::from_numer_denom_ms(config.frame_delay_ms, 1);

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buf, 10);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(frames.into_iter().map(|f| {
            let rgba = DynamicImage::ImageRgb8(f).to_rgba8();
            Frame::from_parts(rgba, 0, 0, delay)
        }))?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_stop_below_last_window() {
        let config = ScrollConfig::default();
        let offsets = scroll_offsets(170, &config).unwrap();
        assert_eq!(offsets, vec![0, 5, 10, 15]);
    }

    #[test]
    fn test_short_image_rejected() {
        let config = ScrollConfig::default();
        assert!(matches!(
            scroll_offsets(150, &config),
            Err(MediaError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_frames_are_windows() {
        let img = RgbImage::from_fn(3, 160, |_, y| image::Rgb([y as u8, 0, 0]));
        let frames = scroll_frames(&img, &ScrollConfig::default()).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].dimensions(), (3, 150));
        assert_eq!(frames[1].get_pixel(0, 0).0, [5, 0, 0]);
    }

    #[test]
    fn test_gif_header_and_loop() {
        let img = RgbImage::from_fn(4, 160, |_, y| image::Rgb([0, y as u8, 0]));
        let gif = encode_scroll_gif(&img, &ScrollConfig::default()).unwrap();
        assert_eq!(&gif[..6], b"GIF89a");
        // NETSCAPE2.0 application extension marks a looping animation
        assert!(gif.windows(11).any(|w| w == b"NETSCAPE2.0"));
    }
}
