//! Test fixtures: synthetic signature images

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Dark pen stroke on white paper; `variant` changes the stroke shape
pub fn signature_image(variant: u32, width: u32, height: u32) -> DynamicImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([255u8]));
    let freq = 0.02 + 0.015 * variant as f64;
    let phase = variant as f64 * 0.7;
    let amplitude = height as f64 * 0.3;
    let mid = height as f64 / 2.0;
    let margin = width / 10;

    for x in margin..width.saturating_sub(margin) {
        let y = mid + amplitude * (x as f64 * freq + phase).sin();
        let y = y.round() as i64;
        for dy in -2..=2 {
            let py = y + dy;
            if (0..height as i64).contains(&py) {
                img.put_pixel(x, py as u32, Luma([20u8]));
            }
        }
    }

    DynamicImage::ImageLuma8(img)
}

pub fn blank_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255u8])))
}

pub fn noise_image(seed: u64, width: u32, height: u32) -> DynamicImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let img = GrayImage::from_fn(width, height, |_, _| Luma([rng.gen::<u8>()]));
    DynamicImage::ImageLuma8(img)
}

pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn write_png(dir: &Path, name: &str, img: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(img)).unwrap();
    path
}
