//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They sit between
//! the request the caller submits and the pixel code in
//! [`transform`](super::transform), so the dimension math can be planned and
//! tested without touching a raster.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Dimensions`]: A width/height pair.
//! - [`ResizeSpec`]: Requested output box plus whether the aspect ratio is kept.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
///
/// Zero is never produced: a quality of 0 yields pathological output from
/// most encoders, so the lower bound is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quality(pub u32);

impl Quality {
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Step down by `step`, never going below `floor`.
    pub fn reduced_by(self, step: u32, floor: Quality) -> Self {
        Self::new(self.0.saturating_sub(step).max(floor.0))
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Width and height of a raster or of an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Bytes needed to hold this many RGBA8 pixels.
    pub fn rgba_bytes(self) -> u64 {
        self.width as u64 * self.height as u64 * 4
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Requested output geometry.
///
/// - both sides + `maintain_aspect` → fit inside the box
/// - both sides, no aspect → stretch to the exact box
/// - one side → derive the other from the source aspect ratio
/// - neither → pass through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub maintain_aspect: bool,
}

impl ResizeSpec {
    pub fn is_passthrough(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }
}
