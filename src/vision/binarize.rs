//! Sign image binarization
//!
//! Fixed four-stage pipeline preparing a captured preview frame for text
//! recognition: smoothing denoise, grayscale conversion, adaptive local
//! thresholding and polarity inversion. Each stage consumes the previous
//! stage's output, so intermediates are released as the pipeline advances.

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, RgbaImage};
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::render::Snapshot;

/// Tuning for the binarization stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinarizeSettings {
    /// Gaussian denoise sigma.
    pub blur_sigma: f32,
    /// Adaptive threshold block radius; the local window spans
    /// `2 * radius + 1` pixels.
    pub threshold_block_radius: u32,
}

impl Default for BinarizeSettings {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            threshold_block_radius: 5,
        }
    }
}

/// Four-stage denoise / grayscale / threshold / invert pipeline.
pub struct Binarizer {
    settings: BinarizeSettings,
}

impl Binarizer {
    pub fn new(settings: BinarizeSettings) -> Self {
        Self { settings }
    }

    /// Run the full pipeline on a captured frame.
    ///
    /// The result is a binary image with dark sign text turned white on a
    /// black background, the polarity the recognizer expects.
    pub fn run(&self, frame: &Snapshot) -> Result<GrayImage> {
        let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
            .context("snapshot buffer does not match its dimensions")?;

        let denoised = self.denoise(rgba);
        let gray = to_grayscale(denoised);
        let binary = self.threshold(gray);
        let result = invert(binary);

        debug!(
            "binarized {}x{} frame",
            result.width(),
            result.height()
        );
        Ok(result)
    }

    fn denoise(&self, image: RgbaImage) -> RgbaImage {
        gaussian_blur_f32(&image, self.settings.blur_sigma)
    }

    fn threshold(&self, image: GrayImage) -> GrayImage {
        adaptive_threshold(&image, self.settings.threshold_block_radius)
    }
}

impl Default for Binarizer {
    fn default() -> Self {
        Self::new(BinarizeSettings::default())
    }
}

fn to_grayscale(image: RgbaImage) -> GrayImage {
    DynamicImage::ImageRgba8(image).to_luma8()
}

fn invert(mut image: GrayImage) -> GrayImage {
    image::imageops::invert(&mut image);
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ColorSpace;

    fn snapshot_with_dark_square(size: u32, square: u32) -> Snapshot {
        let mut data = vec![255u8; (size * size * 4) as usize];
        let start = (size - square) / 2;
        for y in start..start + square {
            for x in start..start + square {
                let i = ((y * size + x) * 4) as usize;
                data[i] = 10;
                data[i + 1] = 10;
                data[i + 2] = 10;
            }
        }
        Snapshot::new(data, size, size, ColorSpace::Srgb)
    }

    #[test]
    fn test_output_is_binary_and_keeps_dimensions() {
        let snap = snapshot_with_dark_square(16, 3);
        let result = Binarizer::default().run(&snap).unwrap();

        assert_eq!(result.dimensions(), (16, 16));
        for pixel in result.pixels() {
            assert!(pixel.0[0] == 0 || pixel.0[0] == 255);
        }
    }

    #[test]
    fn test_dark_text_comes_out_white() {
        // A small dark mark on a light background is below its local mean,
        // so thresholding zeroes it and the inversion turns it white.
        let snap = snapshot_with_dark_square(16, 3);
        let result = Binarizer::default().run(&snap).unwrap();
        assert_eq!(result.get_pixel(7, 7).0[0], 255);
    }

    #[test]
    fn test_mismatched_buffer_is_rejected() {
        let snap = Snapshot::new(vec![0u8; 12], 4, 4, ColorSpace::Srgb);
        assert!(Binarizer::default().run(&snap).is_err());
    }
}
