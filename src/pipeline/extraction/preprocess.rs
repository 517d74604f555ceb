//! Image normalization ahead of text recognition.
//!
//! Receipt photos and screenshots arrive at arbitrary sizes and quality. Each
//! step here is a pure function over an `RgbImage`, composed by
//! `normalize_image`:
//!
//! 1. decode + RGB conversion
//! 2. upscale to a minimum width (aspect ratio preserved, Lanczos3)
//! 3. contrast enhancement against the mean grey level
//! 4. sharpness enhancement against a smoothed copy
//! 5. one 3x3 sharpen convolution

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tracing::debug;

use super::ExtractionError;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Narrower images are upscaled to exactly this width.
pub const MIN_OCR_WIDTH: u32 = 800;

pub const CONTRAST_FACTOR: f32 = 1.5;
pub const SHARPNESS_FACTOR: f32 = 2.0;

/// 3x3 smoothing kernel used as the sharpness baseline.
const SMOOTH_KERNEL: [i32; 9] = [1, 1, 1, 1, 5, 1, 1, 1, 1];
const SMOOTH_DIVISOR: i32 = 13;

/// 3x3 sharpening kernel.
const SHARPEN_KERNEL: [i32; 9] = [-2, -2, -2, -2, 32, -2, -2, -2, -2];
const SHARPEN_DIVISOR: i32 = 16;

// ═══════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════

/// Decode and normalize a receipt image for OCR.
pub fn normalize_image(image_bytes: &[u8]) -> Result<RgbImage, ExtractionError> {
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| ExtractionError::ImageDecode(e.to_string()))?;
    let rgb = img.to_rgb8();
    debug!(width = rgb.width(), height = rgb.height(), "Decoded receipt image");

    let resized = upscale_to_min_width(&rgb, MIN_OCR_WIDTH);
    let contrasted = enhance_contrast(&resized, CONTRAST_FACTOR);
    let sharpened = enhance_sharpness(&contrasted, SHARPNESS_FACTOR);
    Ok(convolve3x3(&sharpened, &SHARPEN_KERNEL, SHARPEN_DIVISOR))
}

/// Normalize and re-encode as PNG, ready for an `OcrEngine`.
pub fn normalize_to_png(image_bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    let normalized = normalize_image(image_bytes)?;
    encode_png(&normalized)
}

/// Upscale to `min_width` if narrower, preserving aspect ratio. Wider images are returned as-is.
pub fn upscale_to_min_width(img: &RgbImage, min_width: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || w >= min_width {
        return img.clone();
    }
    let new_h = ((h as f64) * (min_width as f64) / (w as f64)) as u32;
    let new_h = new_h.max(1);
    debug!(from_w = w, from_h = h, to_w = min_width, to_h = new_h, "Upscaling narrow image");
    image::imageops::resize(img, min_width, new_h, FilterType::Lanczos3)
}

/// Blend against a uniform image at the mean luminance.
/// `factor` 1.0 is identity; greater values push pixels away from the mean.
pub fn enhance_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let mean = mean_luminance(img);
    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        for c in pixel.0.iter_mut() {
            *c = blend(mean, *c as f32, factor);
        }
    }
    out
}

/// Blend against a smoothed copy. `factor` 1.0 is identity.
pub fn enhance_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let smooth = convolve3x3(img, &SMOOTH_KERNEL, SMOOTH_DIVISOR);
    let mut out = img.clone();
    for (dst, base) in out.pixels_mut().zip(smooth.pixels()) {
        for ch in 0..3 {
            dst.0[ch] = blend(base.0[ch] as f32, dst.0[ch] as f32, factor);
        }
    }
    out
}

/// Apply a 3x3 kernel per channel. Border pixels are copied unchanged.
pub fn convolve3x3(img: &RgbImage, kernel: &[i32; 9], divisor: i32) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = img.clone();
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0i32; 3];
            for ky in 0..3u32 {
                for kx in 0..3u32 {
                    let weight = kernel[(ky * 3 + kx) as usize];
                    let px = img.get_pixel(x + kx - 1, y + ky - 1);
                    for ch in 0..3 {
                        acc[ch] += weight * px.0[ch] as i32;
                    }
                }
            }
            let value = acc.map(|sum| {
                let v = (sum as f32 / divisor as f32).round();
                v.clamp(0.0, 255.0) as u8
            });
            out.put_pixel(x, y, Rgb(value));
        }
    }
    out
}

/// Encode an RGB image as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, ExtractionError> {
    let dynamic = DynamicImage::ImageRgb8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

// ═══════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════

/// ITU-R 601-2 luma, rounded to the nearest integer level.
fn mean_luminance(img: &RgbImage) -> f32 {
    let count = (img.width() as u64) * (img.height() as u64);
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = img
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            ((r as u64) * 299 + (g as u64) * 587 + (b as u64) * 114) / 1000
        })
        .sum();
    ((sum as f64 / count as f64) + 0.5).floor() as f32
}

fn blend(base: f32, value: f32, factor: f32) -> u8 {
    (base + factor * (value - base)).round().clamp(0.0, 255.0) as u8
}
