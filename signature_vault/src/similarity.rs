//! Signature Vault - Similarity Engine
//!
//! Both images are converted to 8-bit grayscale and resized to the same
//! square canvas, then compared with the mean structural similarity index
//! (uniform window, K1 = 0.01, K2 = 0.03, sample covariance). Only windows
//! lying fully inside the canvas contribute to the mean.

use std::io;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};

use crate::config::VerifierConfig;
use crate::error::{VaultError, VaultResult};
use crate::secure_fs;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Structural-similarity scorer over normalized grayscale images
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    canvas: u32,
    window: u32,
}

impl SimilarityEngine {
    pub fn new(canvas: u32, window: u32) -> VaultResult<Self> {
        let config = VerifierConfig {
            canvas_size: canvas,
            window_size: window,
            ..VerifierConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &VerifierConfig) -> VaultResult<Self> {
        config.validate()?;
        Ok(Self {
            canvas: config.canvas_size,
            window: config.window_size,
        })
    }

    /// Score two plaintext image files on the 0-100 scale
    ///
    /// Neither file is modified. Bytes that are not a decodable image,
    /// including ciphertext, fail with `ImageDecode`.
    pub fn compare(&self, a: &Path, b: &Path) -> VaultResult<f64> {
        let first = load_image(a)?;
        let second = load_image(b)?;
        let score = self.compare_images(&first, &second);
        log::debug!(
            "Similarity {} vs {}: {:.2}",
            a.display(),
            b.display(),
            score
        );
        Ok(score)
    }

    /// Score two decoded images on the 0-100 scale
    pub fn compare_images(&self, a: &DynamicImage, b: &DynamicImage) -> f64 {
        let a = self.normalize(a);
        let b = self.normalize(b);
        score_from_ssim(mean_ssim(&a, &b, self.window))
    }

    /// Grayscale, then resize to the square canvas
    pub fn normalize(&self, img: &DynamicImage) -> GrayImage {
        let gray = img.to_luma8();
        if gray.dimensions() == (self.canvas, self.canvas) {
            return gray;
        }
        imageops::resize(&gray, self.canvas, self.canvas, FilterType::Triangle)
    }
}

/// Map an SSIM value onto 0-100; anti-correlated images floor at 0
pub fn score_from_ssim(ssim: f64) -> f64 {
    (ssim * 100.0).clamp(0.0, 100.0)
}

fn load_image(path: &Path) -> VaultResult<DynamicImage> {
    let data = secure_fs::read_secret(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => VaultError::MissingAsset(path.display().to_string()),
        _ => VaultError::Io(e),
    })?;

    image::load_from_memory(&data)
        .map_err(|e| VaultError::ImageDecode(format!("{}: {}", path.display(), e)))
}

/// Summed-area table with a zero top row and left column
struct Integral {
    stride: usize,
    sums: Vec<u64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize) -> u64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0u64; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0u64;
            for x in 0..width {
                row += value(y * width + x);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over the `size`-square window whose top-left pixel is (x, y)
    fn window(&self, x: usize, y: usize, size: usize) -> u64 {
        let s = self.stride;
        let (x1, y1) = (x + size, y + size);
        self.sums[y1 * s + x1] + self.sums[y * s + x] - self.sums[y * s + x1] - self.sums[y1 * s + x]
    }
}

/// Mean SSIM over all full windows of two equally sized images
///
/// Window sums are exact integers, so comparing an image with itself gives
/// exactly 1.0 and swapping the arguments gives a bit-identical result.
pub(crate) fn mean_ssim(a: &GrayImage, b: &GrayImage, window: u32) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());

    let (width, height) = (a.width() as usize, a.height() as usize);
    let win = window as usize;
    if width < win || height < win {
        return 0.0;
    }

    let pa = a.as_raw();
    let pb = b.as_raw();
    let sum_a = Integral::build(width, height, |i| pa[i] as u64);
    let sum_b = Integral::build(width, height, |i| pb[i] as u64);
    let sum_aa = Integral::build(width, height, |i| (pa[i] as u64) * (pa[i] as u64));
    let sum_bb = Integral::build(width, height, |i| (pb[i] as u64) * (pb[i] as u64));
    let sum_ab = Integral::build(width, height, |i| (pa[i] as u64) * (pb[i] as u64));

    let np = (win * win) as f64;
    let cov_norm = np / (np - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;
    for y in 0..=(height - win) {
        for x in 0..=(width - win) {
            let ux = sum_a.window(x, y, win) as f64 / np;
            let uy = sum_b.window(x, y, win) as f64 / np;
            let uxx = sum_aa.window(x, y, win) as f64 / np;
            let uyy = sum_bb.window(x, y, win) as f64 / np;
            let uxy = sum_ab.window(x, y, win) as f64 / np;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * (ux * uy) + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    total / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{blank_image, noise_image, signature_image, write_png};
    use image::GenericImageView;
    use tempfile::tempdir;

    fn engine() -> SimilarityEngine {
        SimilarityEngine::new(300, 7).unwrap()
    }

    #[test]
    fn test_identical_images_score_100() {
        let dir = tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", &signature_image(1, 420, 180));
        let b = write_png(dir.path(), "b.png", &signature_image(1, 420, 180));

        assert_eq!(engine().compare(&a, &b).unwrap(), 100.0);
        assert_eq!(engine().compare(&a, &a).unwrap(), 100.0);
    }

    #[test]
    fn test_score_is_symmetric() {
        let dir = tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", &signature_image(1, 420, 180));
        let b = write_png(dir.path(), "b.png", &signature_image(2, 380, 200));

        let ab = engine().compare(&a, &b).unwrap();
        let ba = engine().compare(&b, &a).unwrap();
        assert_eq!(ab, ba);
        assert!(ab < 100.0);
    }

    #[test]
    fn test_unrelated_images_score_low() {
        let score = engine().compare_images(&blank_image(300, 300), &noise_image(7, 300, 300));
        assert!(score < 20.0, "score was {}", score);
    }

    #[test]
    fn test_resolution_independent_shape() {
        let normalized = engine().normalize(&signature_image(3, 640, 240));
        assert_eq!(normalized.dimensions(), (300, 300));

        let score = engine().compare_images(&signature_image(3, 640, 240), &blank_image(50, 50));
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn test_ciphertext_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", &signature_image(1, 200, 100));
        let b = dir.path().join("b.png");
        std::fs::write(&b, [0x5Au8; 128]).unwrap();

        assert!(matches!(engine().compare(&a, &b), Err(VaultError::ImageDecode(_))));
        assert!(matches!(engine().compare(&b, &a), Err(VaultError::ImageDecode(_))));
    }

    #[test]
    fn test_score_from_ssim_clamps() {
        assert_eq!(score_from_ssim(1.0), 100.0);
        assert_eq!(score_from_ssim(0.8), 80.0);
        assert_eq!(score_from_ssim(-0.4), 0.0);
    }

    #[test]
    fn test_small_window_on_tiny_canvas() {
        let engine = SimilarityEngine::new(8, 3).unwrap();
        let img = signature_image(4, 64, 32);
        assert_eq!(engine.compare_images(&img, &img), 100.0);
        assert_eq!(img.dimensions(), (64, 32));
        assert!(SimilarityEngine::new(8, 4).is_err());
    }
}
