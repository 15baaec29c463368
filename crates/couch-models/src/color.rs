//! Colour math: RGB, HSV, hex strings and colour-family buckets.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{ModelError, ModelResult};

/// RGB colour with channels on the 0-255 scale.
///
/// Channels are floating point so cluster centroids keep their precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn from_u8(pixel: [u8; 3]) -> Self {
        Self::new(pixel[0] as f64, pixel[1] as f64, pixel[2] as f64)
    }

    /// Channels rounded half-to-even and clamped to u8.
    pub fn to_u8(&self) -> [u8; 3] {
        [channel_u8(self.r), channel_u8(self.g), channel_u8(self.b)]
    }

    /// `#rrggbb` rendering.
    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.to_u8();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }

    /// Parse `#rrggbb` (leading `#` optional, case-insensitive).
    pub fn from_hex(hex: &str) -> ModelResult<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ModelError::invalid_hex(hex));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ModelError::invalid_hex(hex))
        };
        Ok(Self::from_u8([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
    }

    /// Standard RGB to HSV transform with all components in [0, 1].
    pub fn to_hsv(&self) -> Hsv {
        let r = self.r / 255.0;
        let g = self.g / 255.0;
        let b = self.b / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let v = max;
        let s = if max == 0.0 { 0.0 } else { delta / max };

        let h = if delta == 0.0 {
            0.0
        } else if max == r {
            ((g - b) / delta).rem_euclid(6.0) / 6.0
        } else if max == g {
            ((b - r) / delta + 2.0) / 6.0
        } else {
            ((r - g) / delta + 4.0) / 6.0
        };

        Hsv { h, s, v }
    }
}

fn channel_u8(value: f64) -> u8 {
    value.round_ties_even().clamp(0.0, 255.0) as u8
}

/// HSV triple, each component in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

impl Hsv {
    pub fn new(h: f64, s: f64, v: f64) -> Self {
        Self { h, s, v }
    }

    /// Lexicographic (hue, saturation, value) ordering.
    pub fn cmp_hsv(&self, other: &Hsv) -> Ordering {
        self.h
            .total_cmp(&other.h)
            .then_with(|| self.s.total_cmp(&other.s))
            .then_with(|| self.v.total_cmp(&other.v))
    }

    /// Ordering used when grouping by family: (hue, value).
    pub fn cmp_hue_value(&self, other: &Hsv) -> Ordering {
        self.h
            .total_cmp(&other.h)
            .then_with(|| self.v.total_cmp(&other.v))
    }
}

/// Coarse colour bucket used only for grouping visualisations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFamily {
    GreyWhite,
    DarkGreyBlack,
    Red,
    Orange,
    YellowBrown,
    Green,
    Cyan,
    Blue,
    Purple,
    Other,
}

impl ColorFamily {
    /// First matching rule wins; the low-saturation rules take priority over hue.
    pub fn from_hsv(hsv: Hsv) -> Self {
        let Hsv { h, s, v } = hsv;
        if s < 0.2 && v > 0.8 {
            ColorFamily::GreyWhite
        } else if s < 0.2 && v < 0.5 {
            ColorFamily::DarkGreyBlack
        } else if h < 0.05 || h > 0.95 {
            ColorFamily::Red
        } else if (0.05..0.15).contains(&h) {
            ColorFamily::Orange
        } else if (0.15..0.35).contains(&h) {
            ColorFamily::YellowBrown
        } else if (0.35..0.5).contains(&h) {
            ColorFamily::Green
        } else if (0.5..0.65).contains(&h) {
            ColorFamily::Cyan
        } else if (0.65..0.85).contains(&h) {
            ColorFamily::Blue
        } else if (0.85..0.95).contains(&h) {
            ColorFamily::Purple
        } else {
            ColorFamily::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ColorFamily::GreyWhite => "Grey/White",
            ColorFamily::DarkGreyBlack => "Dark Grey/Black",
            ColorFamily::Red => "Red",
            ColorFamily::Orange => "Orange",
            ColorFamily::YellowBrown => "Yellow/Brown",
            ColorFamily::Green => "Green",
            ColorFamily::Cyan => "Cyan",
            ColorFamily::Blue => "Blue",
            ColorFamily::Purple => "Purple",
            ColorFamily::Other => "Other",
        }
    }
}

impl fmt::Display for ColorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_hex_roundtrip_and_case() {
        let c = Rgb::from_hex("#A0b1C2").unwrap();
        assert_eq!(c.to_u8(), [0xa0, 0xb1, 0xc2]);
        assert_eq!(c.to_hex(), "#a0b1c2");
        assert_eq!(Rgb::from_hex("ffffff").unwrap().to_u8(), [255, 255, 255]);
    }

    #[test]
    fn test_hex_rejects_garbage() {
        assert!(Rgb::from_hex("#12345").is_err());
        assert!(Rgb::from_hex("#gg0000").is_err());
        assert!(Rgb::from_hex("#ééé").is_err());
    }

    #[test]
    fn test_centroid_rounding_is_half_even() {
        assert_eq!(Rgb::new(2.5, 3.5, 254.6).to_u8(), [2, 4, 255]);
        assert_eq!(Rgb::new(-1.0, 300.0, 0.49).to_u8(), [0, 255, 0]);
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        let red = Rgb::new(255.0, 0.0, 0.0).to_hsv();
        assert_close(red.h, 0.0);
        assert_close(red.s, 1.0);
        assert_close(red.v, 1.0);

        let green = Rgb::new(0.0, 255.0, 0.0).to_hsv();
        assert_close(green.h, 1.0 / 3.0);

        let blue = Rgb::new(0.0, 0.0, 255.0).to_hsv();
        assert_close(blue.h, 2.0 / 3.0);

        let magenta_ish = Rgb::new(255.0, 0.0, 51.0).to_hsv();
        assert!(magenta_ish.h > 0.95 && magenta_ish.h < 1.0);
    }

    #[test]
    fn test_rgb_to_hsv_grey() {
        let grey = Rgb::new(128.0, 128.0, 128.0).to_hsv();
        assert_close(grey.h, 0.0);
        assert_close(grey.s, 0.0);
        assert_close(grey.v, 128.0 / 255.0);

        let black = Rgb::new(0.0, 0.0, 0.0).to_hsv();
        assert_close(black.s, 0.0);
        assert_close(black.v, 0.0);
    }

    #[test]
    fn test_hsv_ordering() {
        let a = Hsv::new(0.1, 0.5, 0.5);
        let b = Hsv::new(0.1, 0.6, 0.2);
        let c = Hsv::new(0.2, 0.0, 0.0);
        assert_eq!(a.cmp_hsv(&b), Ordering::Less);
        assert_eq!(b.cmp_hsv(&c), Ordering::Less);
        assert_eq!(a.cmp_hsv(&a), Ordering::Equal);
        assert_eq!(b.cmp_hue_value(&a), Ordering::Less);
    }

    #[test]
    fn test_family_priority_rules() {
        // Low saturation short-circuits the purple hue band
        assert_eq!(ColorFamily::from_hsv(Hsv::new(0.9, 0.1, 0.9)), ColorFamily::GreyWhite);
        assert_eq!(ColorFamily::from_hsv(Hsv::new(0.6, 0.1, 0.3)), ColorFamily::DarkGreyBlack);
        // Mid brightness grey falls through to the hue rules
        assert_eq!(ColorFamily::from_hsv(Hsv::new(0.0, 0.1, 0.6)), ColorFamily::Red);
    }

    #[test]
    fn test_family_hue_bands() {
        let family = |h: f64| ColorFamily::from_hsv(Hsv::new(h, 0.8, 0.7));
        assert_eq!(family(0.0), ColorFamily::Red);
        assert_eq!(family(0.97), ColorFamily::Red);
        assert_eq!(family(0.05), ColorFamily::Orange);
        assert_eq!(family(0.15), ColorFamily::YellowBrown);
        assert_eq!(family(0.35), ColorFamily::Green);
        assert_eq!(family(0.5), ColorFamily::Cyan);
        assert_eq!(family(0.65), ColorFamily::Blue);
        assert_eq!(family(0.85), ColorFamily::Purple);
        assert_eq!(family(0.95), ColorFamily::Other);
        assert_eq!(family(f64::NAN), ColorFamily::Other);
    }

    #[test]
    fn test_family_labels() {
        assert_eq!(ColorFamily::GreyWhite.to_string(), "Grey/White");
        assert_eq!(ColorFamily::YellowBrown.label(), "Yellow/Brown");
    }
}
