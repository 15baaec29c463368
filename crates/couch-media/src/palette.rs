//! Dominant colours of an isolated region via k-means clustering.
//!
//! Near-black pixels are treated as background (masks zero everything
//! outside the object) and excluded before clustering. Clustering uses
//! k-means++ seeding and Lloyd iterations, keeping the best of `n_init`
//! restarts by inertia. The generator is seeded so results are repeatable.

use couch_models::{Hsv, Rgb};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

/// Errors from palette extraction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaletteError {
    #[error("cluster count must be at least 1, got {0}")]
    InvalidClusterCount(usize),

    #[error("{retained} foreground pixels cannot form {clusters} clusters")]
    InsufficientPixels { retained: usize, clusters: usize },
}

/// Clustering parameters.
#[derive(Debug, Clone)]
pub struct PaletteConfig {
    /// A pixel whose channels are all at or below this is background
    pub background_threshold: u8,
    pub seed: u64,
    pub max_iterations: usize,
    /// Convergence bound on centroid movement, relative to data variance
    pub tolerance: f64,
    pub n_init: usize,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            background_threshold: 30,
            seed: 42,
            max_iterations: 300,
            tolerance: 1e-4,
            n_init: 3,
        }
    }
}

/// One cluster: its centroid colour and share of the foreground pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteEntry {
    pub color: Rgb,
    pub proportion: f64,
}

impl PaletteEntry {
    pub fn hex(&self) -> String {
        self.color.to_hex()
    }

    pub fn hsv(&self) -> Hsv {
        self.color.to_hsv()
    }
}

/// Clusters sorted by centroid (hue, saturation, value).
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hex_colors(&self) -> Vec<String> {
        self.entries.iter().map(PaletteEntry::hex).collect()
    }

    pub fn proportions(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.proportion).collect()
    }

    /// First entry with the largest proportion.
    pub fn dominant(&self) -> Option<&PaletteEntry> {
        self.entries.iter().fold(None, |best: Option<&PaletteEntry>, e| match best {
            Some(b) if b.proportion >= e.proportion => Some(b),
            _ => Some(e),
        })
    }

    /// HSV of the dominant colour as rendered to hex.
    pub fn dominant_hsv(&self) -> Option<Hsv> {
        self.dominant()
            .map(|e| Rgb::from_u8(e.color.to_u8()).to_hsv())
    }
}

/// Pixels that survive background exclusion.
pub fn foreground_pixels(image: &RgbImage, background_threshold: u8) -> Vec<[f64; 3]> {
    image
        .pixels()
        .filter(|p| p.0.iter().any(|&c| c > background_threshold))
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect()
}

/// Extract `k` dominant colours from an image.
pub fn extract_palette(
    image: &RgbImage,
    k: usize,
    config: &PaletteConfig,
) -> Result<Palette, PaletteError> {
    if k == 0 {
        return Err(PaletteError::InvalidClusterCount(k));
    }

    let pixels = foreground_pixels(image, config.background_threshold);
    if pixels.len() < k {
        return Err(PaletteError::InsufficientPixels {
            retained: pixels.len(),
            clusters: k,
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<KMeansFit> = None;
    for _ in 0..config.n_init.max(1) {
        let fit = kmeans(&pixels, k, config, &mut rng);
        if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }
    let Some(fit) = best else {
        return Err(PaletteError::InvalidClusterCount(k));
    };

    let total = pixels.len() as f64;
    let mut entries: Vec<PaletteEntry> = fit
        .centroids
        .iter()
        .zip(&fit.counts)
        .map(|(c, &count)| PaletteEntry {
            color: Rgb::new(c[0], c[1], c[2]),
            proportion: count as f64 / total,
        })
        .collect();
    entries.sort_by(|a, b| a.hsv().cmp_hsv(&b.hsv()));

    debug!(
        pixels = pixels.len(),
        clusters = k,
        inertia = fit.inertia,
        "Palette extracted"
    );

    Ok(Palette { entries })
}

struct KMeansFit {
    centroids: Vec<[f64; 3]>,
    counts: Vec<usize>,
    inertia: f64,
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

/// Index and squared distance of the closest centroid.
fn nearest(point: &[f64; 3], centroids: &[[f64; 3]]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Mean per-channel variance, used to scale the tolerance.
fn mean_variance(points: &[[f64; 3]]) -> f64 {
    let n = points.len() as f64;
    let mut total = 0.0;
    for ch in 0..3 {
        let mean = points.iter().map(|p| p[ch]).sum::<f64>() / n;
        total += points.iter().map(|p| (p[ch] - mean).powi(2)).sum::<f64>() / n;
    }
    total / 3.0
}

fn kmeans_plus_plus(points: &[[f64; 3]], k: usize, rng: &mut StdRng) -> Vec<[f64; 3]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..points.len())]);

    let mut distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = points.len() - 1;
            for (i, d) in distances.iter().enumerate() {
                cumulative += d;
                if cumulative >= target && *d > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            rng.random_range(0..points.len())
        };

        let centroid = points[next];
        for (d, p) in distances.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn kmeans(points: &[[f64; 3]], k: usize, config: &PaletteConfig, rng: &mut StdRng) -> KMeansFit {
    let tolerance = config.tolerance * mean_variance(points);
    let mut centroids = kmeans_plus_plus(points, k, rng);
    let mut distances = vec![0.0f64; points.len()];

    for iteration in 0..config.max_iterations.max(1) {
        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];

        for (p, dist) in points.iter().zip(distances.iter_mut()) {
            let (cluster, d) = nearest(p, &centroids);
            *dist = d;
            counts[cluster] += 1;
            for ch in 0..3 {
                sums[cluster][ch] += p[ch];
            }
        }

        let mut updated = centroids.clone();
        for cluster in 0..k {
            if counts[cluster] > 0 {
                let n = counts[cluster] as f64;
                updated[cluster] = [
                    sums[cluster][0] / n,
                    sums[cluster][1] / n,
                    sums[cluster][2] / n,
                ];
            } else {
                // Relocate to the worst-fit pixel; mark it used.
                let (far, _) = distances
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (i, &d)| if d > acc.1 { (i, d) } else { acc });
                updated[cluster] = points[far];
                distances[far] = f64::NEG_INFINITY;
            }
        }

        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;

        if shift <= tolerance {
            debug!(iteration, "k-means converged");
            break;
        }
    }

    let mut counts = vec![0usize; k];
    let mut inertia = 0.0;
    for p in points {
        let (cluster, d) = nearest(p, &centroids);
        counts[cluster] += 1;
        inertia += d;
    }

    KMeansFit {
        centroids,
        counts,
        inertia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb as Pixel;

    /// Left third red, middle third blue, right third black background.
    fn two_colour_image() -> RgbImage {
        RgbImage::from_fn(30, 10, |x, _| match x {
            0..=9 => Pixel([200, 30, 30]),
            10..=19 => Pixel([40, 60, 220]),
            _ => Pixel([0, 0, 0]),
        })
    }

    #[test]
    fn test_background_is_excluded() {
        let img = RgbImage::from_fn(4, 1, |x, _| match x {
            0 => Pixel([30, 30, 30]),
            1 => Pixel([31, 0, 0]),
            2 => Pixel([0, 0, 0]),
            _ => Pixel([100, 100, 100]),
        });
        assert_eq!(foreground_pixels(&img, 30).len(), 2);
    }

    #[test]
    fn test_two_clusters_recovered() {
        let palette = extract_palette(&two_colour_image(), 2, &PaletteConfig::default()).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.hex_colors(), vec!["#c81e1e", "#283cdc"]);
        for p in palette.proportions() {
            assert!((p - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_proportions_sum_to_one_and_sorted_by_hsv() {
        let img = RgbImage::from_fn(40, 40, |x, y| {
            Pixel([(x * 5) as u8 + 40, (y * 5) as u8 + 35, ((x + y) * 2) as u8 + 32])
        });
        let palette = extract_palette(&img, 5, &PaletteConfig::default()).unwrap();
        assert_eq!(palette.hex_colors().len(), 5);
        assert_eq!(palette.proportions().len(), 5);
        let sum: f64 = palette.proportions().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);

        for pair in palette.entries().windows(2) {
            assert_ne!(pair[0].hsv().cmp_hsv(&pair[1].hsv()), std::cmp::Ordering::Greater);
        }
    }

    #[test]
    fn test_same_seed_same_palette() {
        let img = RgbImage::from_fn(32, 32, |x, y| Pixel([(x * 6) as u8 + 40, (y * 6) as u8 + 40, 90]));
        let config = PaletteConfig::default();
        let a = extract_palette(&img, 4, &config).unwrap();
        let b = extract_palette(&img, 4, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_background_fails() {
        let img = RgbImage::from_pixel(8, 8, Pixel([10, 20, 30]));
        assert_eq!(
            extract_palette(&img, 5, &PaletteConfig::default()),
            Err(PaletteError::InsufficientPixels {
                retained: 0,
                clusters: 5
            })
        );
    }

    #[test]
    fn test_zero_clusters_rejected() {
        let img = two_colour_image();
        assert_eq!(
            extract_palette(&img, 0, &PaletteConfig::default()),
            Err(PaletteError::InvalidClusterCount(0))
        );
    }

    #[test]
    fn test_duplicate_pixels_fill_every_cluster() {
        let img = RgbImage::from_pixel(5, 5, Pixel([120, 80, 60]));
        let palette = extract_palette(&img, 3, &PaletteConfig::default()).unwrap();
        assert_eq!(palette.len(), 3);
        let sum: f64 = palette.proportions().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(palette.dominant().unwrap().hex(), "#78503c");
    }

    #[test]
    fn test_dominant_first_of_largest() {
        let palette = Palette {
            entries: vec![
                PaletteEntry { color: Rgb::new(10.0, 0.0, 0.0), proportion: 0.2 },
                PaletteEntry { color: Rgb::new(0.0, 10.0, 0.0), proportion: 0.4 },
                PaletteEntry { color: Rgb::new(0.0, 0.0, 10.0), proportion: 0.4 },
            ],
        };
        assert_eq!(palette.dominant().unwrap().color, Rgb::new(0.0, 10.0, 0.0));
        let hsv = palette.dominant_hsv().unwrap();
        assert!((hsv.h - 1.0 / 3.0).abs() < 1e-9);
    }
}
