//! Geometric transforms: rotation and resize.
//!
//! Both operations consume their input buffer and return a new one. When a
//! transform is a no-op (zero rotation, passthrough resize, same size) the
//! input is handed back untouched instead of being copied.

use super::calculations::{calculate_resize_dimensions, rotated_bounds};
use super::params::{Dimensions, ResizeSpec};
use super::raster::RasterBuffer;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Angles closer than this to a multiple of 90° take the exact fast path.
const RIGHT_ANGLE_EPSILON: f64 = 1e-9;

/// Rotate clockwise by `degrees` around the buffer center.
///
/// The result is sized to the rotated bounding box; uncovered corners are
/// transparent.
pub fn rotate(raster: RasterBuffer, degrees: f64) -> RasterBuffer {
    let normalized = degrees.rem_euclid(360.0);
    let quarter_turns = (normalized / 90.0).round();
    if (normalized - quarter_turns * 90.0).abs() < RIGHT_ANGLE_EPSILON {
        return rotate_right_angle(raster, quarter_turns as u32 % 4);
    }
    rotate_bilinear(&raster, normalized)
}

fn rotate_right_angle(raster: RasterBuffer, quarter_turns: u32) -> RasterBuffer {
    let pixels = match quarter_turns {
        0 => return raster,
        1 => imageops::rotate90(raster.pixels()),
        2 => imageops::rotate180(raster.pixels()),
        _ => imageops::rotate270(raster.pixels()),
    };
    wrap(pixels, raster)
}

/// General rotation by inverse mapping each output pixel into the source.
fn rotate_bilinear(raster: &RasterBuffer, degrees: f64) -> RasterBuffer {
    let source = raster.pixels();
    let out_dims = rotated_bounds(raster.dimensions(), degrees);
    let (sin, cos) = degrees.to_radians().sin_cos();

    let (src_cx, src_cy) = (source.width() as f64 / 2.0, source.height() as f64 / 2.0);
    let (out_cx, out_cy) = (out_dims.width as f64 / 2.0, out_dims.height as f64 / 2.0);

    let pixels = RgbaImage::from_fn(out_dims.width, out_dims.height, |x, y| {
        let dx = x as f64 + 0.5 - out_cx;
        let dy = y as f64 + 0.5 - out_cy;
        // Inverse of a clockwise rotation in y-down coordinates.
        let sx = dx * cos + dy * sin + src_cx - 0.5;
        let sy = -dx * sin + dy * cos + src_cy - 0.5;
        sample_bilinear(source, sx, sy)
    });

    // from_fn never produces an empty image for non-zero bounds
    RasterBuffer::new(pixels).unwrap_or_else(|| raster.clone())
}

fn sample_bilinear(source: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = (source.width() as i64, source.height() as i64);
    if x < -1.0 || y < -1.0 || x > w as f64 || y > h as f64 {
        return TRANSPARENT;
    }

    let (x0, y0) = (x.floor() as i64, y.floor() as i64);
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);

    let texel = |px: i64, py: i64| -> [f64; 4] {
        if px < 0 || py < 0 || px >= w || py >= h {
            return [0.0; 4];
        }
        let p = source.get_pixel(px as u32, py as u32).0;
        [p[0] as f64, p[1] as f64, p[2] as f64, p[3] as f64]
    };

    let (a, b) = (texel(x0, y0), texel(x0 + 1, y0));
    let (c, d) = (texel(x0, y0 + 1), texel(x0 + 1, y0 + 1));

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = a[i] + (b[i] - a[i]) * fx;
        let bottom = c[i] + (d[i] - c[i]) * fx;
        out[i] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Resize according to a [`ResizeSpec`] (fit, stretch, or single side).
pub fn resize(raster: RasterBuffer, spec: &ResizeSpec) -> RasterBuffer {
    if spec.is_passthrough() {
        return raster;
    }
    let target = calculate_resize_dimensions(raster.dimensions(), spec);
    resize_exact(raster, target)
}

/// Resample to exactly `target` pixels.
pub fn resize_exact(raster: RasterBuffer, target: Dimensions) -> RasterBuffer {
    if raster.dimensions() == target {
        return raster;
    }
    resampled(&raster, target).unwrap_or(raster)
}

/// A resampled copy at `target`, leaving `raster` intact.
pub fn resampled(raster: &RasterBuffer, target: Dimensions) -> Option<RasterBuffer> {
    let pixels = imageops::resize(
        raster.pixels(),
        target.width.max(1),
        target.height.max(1),
        FilterType::Lanczos3,
    );
    RasterBuffer::new(pixels)
}

fn wrap(pixels: RgbaImage, fallback: RasterBuffer) -> RasterBuffer {
    RasterBuffer::new(pixels).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RasterBuffer {
        RasterBuffer::new(RgbaImage::from_pixel(width, height, Rgba(color))).unwrap()
    }

    /// 3x2 buffer with a distinct value per pixel.
    fn numbered() -> RasterBuffer {
        RasterBuffer::new(RgbaImage::from_fn(3, 2, |x, y| {
            Rgba([(y * 3 + x) as u8, 0, 0, 255])
        }))
        .unwrap()
    }

    // =========================================================================
    // Rotation
    // =========================================================================

    #[test]
    fn zero_rotation_passes_through() {
        let raster = numbered();
        assert_eq!(rotate(raster.clone(), 0.0), raster);
        assert_eq!(rotate(raster.clone(), 360.0), raster);
    }

    #[test]
    fn quarter_turn_is_clockwise() {
        let rotated = rotate(numbered(), 90.0);
        assert_eq!(rotated.dimensions(), Dimensions::new(2, 3));
        // Bottom-left source pixel (0,1) = 3 lands at top-left after clockwise turn
        assert_eq!(rotated.pixels().get_pixel(0, 0).0[0], 3);
        assert_eq!(rotated.pixels().get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn negative_quarter_turn_matches_270() {
        assert_eq!(rotate(numbered(), -90.0), rotate(numbered(), 270.0));
    }

    #[test]
    fn half_turn_reverses_pixels() {
        let rotated = rotate(numbered(), 180.0);
        assert_eq!(rotated.dimensions(), Dimensions::new(3, 2));
        assert_eq!(rotated.pixels().get_pixel(0, 0).0[0], 5);
    }

    #[test]
    fn arbitrary_angle_grows_to_bounding_box() {
        let rotated = rotate(solid(100, 50, [200, 100, 50, 255]), 30.0);
        assert_eq!(
            rotated.dimensions(),
            rotated_bounds(Dimensions::new(100, 50), 30.0)
        );
    }

    #[test]
    fn arbitrary_angle_corners_are_transparent() {
        let rotated = rotate(solid(100, 100, [200, 100, 50, 255]), 45.0);
        assert_eq!(rotated.pixels().get_pixel(0, 0).0[3], 0);
        let (w, h) = (rotated.width(), rotated.height());
        assert_eq!(rotated.pixels().get_pixel(w - 1, h - 1).0[3], 0);
    }

    #[test]
    fn arbitrary_angle_keeps_center_color() {
        let rotated = rotate(solid(100, 100, [200, 100, 50, 255]), 45.0);
        let center = rotated.pixels().get_pixel(rotated.width() / 2, rotated.height() / 2);
        assert_eq!(center.0, [200, 100, 50, 255]);
    }

    // =========================================================================
    // Resize
    // =========================================================================

    #[test]
    fn resize_fit_within_box() {
        let spec = ResizeSpec {
            width: Some(80),
            height: Some(60),
            maintain_aspect: true,
        };
        let out = resize(solid(160, 90, [1, 2, 3, 255]), &spec);
        assert_eq!(out.dimensions(), Dimensions::new(80, 45));
    }

    #[test]
    fn resize_stretch_to_exact_box() {
        let spec = ResizeSpec {
            width: Some(30),
            height: Some(30),
            maintain_aspect: false,
        };
        let out = resize(solid(160, 90, [1, 2, 3, 255]), &spec);
        assert_eq!(out.dimensions(), Dimensions::new(30, 30));
    }

    #[test]
    fn resize_passthrough_keeps_buffer() {
        let raster = numbered();
        assert_eq!(resize(raster.clone(), &ResizeSpec::default()), raster);
    }

    #[test]
    fn resize_exact_same_size_is_noop() {
        let raster = numbered();
        assert_eq!(resize_exact(raster.clone(), Dimensions::new(3, 2)), raster);
    }
}
