//! Owned in-memory pixel grid.
//!
//! A [`RasterBuffer`] is always RGBA8 and always at least 1×1. Pipeline
//! stages take it by value and hand back a new one, so a buffer is never
//! aliased between stages and the predecessor is dropped as soon as its
//! successor exists.

use super::params::Dimensions;
use image::{DynamicImage, RgbImage, RgbaImage};

#[derive(Debug, Clone, PartialEq)]
pub struct RasterBuffer {
    pixels: RgbaImage,
}

impl RasterBuffer {
    /// Wrap an RGBA image. Returns `None` for an empty image.
    pub fn new(pixels: RgbaImage) -> Option<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return None;
        }
        Some(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Copy into an RGB image, dropping alpha. Used by encoders without an
    /// alpha channel.
    pub fn to_rgb(&self) -> RgbImage {
        DynamicImage::ImageRgba8(self.pixels.clone()).into_rgb8()
    }

    /// Copy into a `DynamicImage`, keeping alpha.
    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.pixels.clone())
    }
}
