//! Color adjustment composition.
//!
//! Every adjustment is a 4×5 affine matrix over `(R, G, B, A, 1)` in the
//! 0–255 channel domain. The active adjustments are multiplied into one
//! composite matrix first, so a pixel is touched exactly once no matter how
//! many adjustments are enabled.
//!
//! Composition order is fixed: brightness/contrast, saturation, hue,
//! temperature, tint, then the optional filter. The maps do not commute, so
//! changing the order changes the output.

use super::raster::RasterBuffer;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Luminance weights used by the saturation and hue matrices.
const LUMA_R: f32 = 0.213;
const LUMA_G: f32 = 0.715;
const LUMA_B: f32 = 0.072;

/// Channel shift applied per unit of temperature or tint.
const SHIFT_SCALE: f32 = 50.0;

/// A row-major 4×5 color matrix.
///
/// Row `i` computes output channel `i` as
/// `m[i*5]*R + m[i*5+1]*G + m[i*5+2]*B + m[i*5+3]*A + m[i*5+4]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorMatrix(pub [f32; 20]);

impl ColorMatrix {
    pub const IDENTITY: ColorMatrix = ColorMatrix([
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ]);

    /// `output = contrast * input + brightness * 255` on R, G and B.
    pub fn brightness_contrast(brightness: f32, contrast: f32) -> Self {
        let offset = brightness * 255.0;
        ColorMatrix([
            contrast, 0.0, 0.0, 0.0, offset, //
            0.0, contrast, 0.0, 0.0, offset, //
            0.0, 0.0, contrast, 0.0, offset, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    /// Scale each channel's distance from luminance-weighted gray.
    pub fn saturation(s: f32) -> Self {
        let inv = 1.0 - s;
        let (r, g, b) = (LUMA_R * inv, LUMA_G * inv, LUMA_B * inv);
        ColorMatrix([
            r + s, g, b, 0.0, 0.0, //
            r, g + s, b, 0.0, 0.0, //
            r, g, b + s, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    /// Rotate hue by `degrees` about the luminance axis.
    pub fn hue_rotation(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        ColorMatrix([
            LUMA_R + cos * (1.0 - LUMA_R) - sin * LUMA_R,
            LUMA_G - cos * LUMA_G - sin * LUMA_G,
            LUMA_B - cos * LUMA_B + sin * (1.0 - LUMA_B),
            0.0,
            0.0,
            LUMA_R - cos * LUMA_R + sin * 0.143,
            LUMA_G + cos * (1.0 - LUMA_G) + sin * 0.140,
            LUMA_B - cos * LUMA_B - sin * 0.283,
            0.0,
            0.0,
            LUMA_R - cos * LUMA_R - sin * (1.0 - LUMA_R),
            LUMA_G - cos * LUMA_G + sin * LUMA_G,
            LUMA_B + cos * (1.0 - LUMA_B) + sin * LUMA_B,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            1.0,
            0.0,
        ])
    }

    /// Warm (positive) or cool (negative): red up, blue down.
    pub fn temperature(t: f32) -> Self {
        Self::shift(t * SHIFT_SCALE, 0.0, -t * SHIFT_SCALE)
    }

    /// Positive tint pushes toward green, negative toward magenta.
    pub fn tint(t: f32) -> Self {
        Self::shift(0.0, t * SHIFT_SCALE, 0.0)
    }

    pub fn grayscale() -> Self {
        Self::saturation(0.0)
    }

    pub fn sepia() -> Self {
        ColorMatrix([
            0.393, 0.769, 0.189, 0.0, 0.0, //
            0.349, 0.686, 0.168, 0.0, 0.0, //
            0.272, 0.534, 0.131, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    pub fn invert() -> Self {
        ColorMatrix([
            -1.0, 0.0, 0.0, 0.0, 255.0, //
            0.0, -1.0, 0.0, 0.0, 255.0, //
            0.0, 0.0, -1.0, 0.0, 255.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    fn shift(r: f32, g: f32, b: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.0[4] = r;
        m.0[9] = g;
        m.0[14] = b;
        m
    }

    /// The matrix that applies `self` first and then `next`.
    pub fn then(&self, next: &ColorMatrix) -> ColorMatrix {
        let (a, b) = (&next.0, &self.0);
        let mut out = [0.0f32; 20];
        for row in 0..4 {
            for col in 0..5 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += a[row * 5 + k] * b[k * 5 + col];
                }
                if col == 4 {
                    sum += a[row * 5 + 4];
                }
                out[row * 5 + col] = sum;
            }
        }
        ColorMatrix(out)
    }

    fn transform(&self, pixel: Rgba<u8>) -> Rgba<u8> {
        let m = &self.0;
        let input = pixel.0.map(f32::from);
        let mut out = [0u8; 4];
        for (row, channel) in out.iter_mut().enumerate() {
            let base = row * 5;
            let value = m[base] * input[0]
                + m[base + 1] * input[1]
                + m[base + 2] * input[2]
                + m[base + 3] * input[3]
                + m[base + 4];
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
        Rgba(out)
    }
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Named filter matrices selectable from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPreset {
    Grayscale,
    Sepia,
    Invert,
}

impl FilterPreset {
    pub fn matrix(self) -> ColorMatrix {
        match self {
            FilterPreset::Grayscale => ColorMatrix::grayscale(),
            FilterPreset::Sepia => ColorMatrix::sepia(),
            FilterPreset::Invert => ColorMatrix::invert(),
        }
    }
}

impl FromStr for FilterPreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "grayscale" | "greyscale" | "mono" => Ok(FilterPreset::Grayscale),
            "sepia" => Ok(FilterPreset::Sepia),
            "invert" | "negative" => Ok(FilterPreset::Invert),
            other => Err(format!(
                "unknown filter '{other}' (expected grayscale, sepia or invert)"
            )),
        }
    }
}

/// Independent color adjustment parameters.
///
/// Neutral values are brightness 0, contrast 1, saturation 1, hue 0,
/// temperature 0, tint 0 and no filter. Out-of-range values are clamped
/// when the composite is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorAdjustmentSpec {
    /// -1.0 ..= 1.0, as a fraction of full scale.
    pub brightness: f32,
    /// 0.0 ..= 2.0
    pub contrast: f32,
    /// 0.0 ..= 2.0
    pub saturation: f32,
    /// -180 ..= 180 degrees
    pub hue: f32,
    /// -1.0 ..= 1.0
    pub temperature: f32,
    /// -1.0 ..= 1.0
    pub tint: f32,
    pub filter: Option<ColorMatrix>,
}

impl Default for ColorAdjustmentSpec {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            hue: 0.0,
            temperature: 0.0,
            tint: 0.0,
            filter: None,
        }
    }
}

impl ColorAdjustmentSpec {
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Multiply the active adjustments into one matrix.
    pub fn compose(&self) -> ColorMatrix {
        let brightness = self.brightness.clamp(-1.0, 1.0);
        let contrast = self.contrast.clamp(0.0, 2.0);
        let saturation = self.saturation.clamp(0.0, 2.0);
        let hue = self.hue.clamp(-180.0, 180.0);
        let temperature = self.temperature.clamp(-1.0, 1.0);
        let tint = self.tint.clamp(-1.0, 1.0);

        let mut matrix = ColorMatrix::brightness_contrast(brightness, contrast)
            .then(&ColorMatrix::saturation(saturation));
        if hue != 0.0 {
            matrix = matrix.then(&ColorMatrix::hue_rotation(hue));
        }
        if temperature != 0.0 {
            matrix = matrix.then(&ColorMatrix::temperature(temperature));
        }
        if tint != 0.0 {
            matrix = matrix.then(&ColorMatrix::tint(tint));
        }
        if let Some(filter) = &self.filter {
            matrix = matrix.then(filter);
        }
        matrix
    }
}

/// Apply a composite matrix to every pixel, producing a new buffer.
pub fn apply(raster: &RasterBuffer, matrix: &ColorMatrix) -> RasterBuffer {
    let source = raster.pixels();
    let out = RgbaImage::from_fn(source.width(), source.height(), |x, y| {
        matrix.transform(*source.get_pixel(x, y))
    });
    RasterBuffer::new(out).unwrap_or_else(|| raster.clone())
}

/// Compose `spec` and apply it in one pass.
pub fn adjust(raster: &RasterBuffer, spec: &ColorAdjustmentSpec) -> RasterBuffer {
    apply(raster, &spec.compose())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RasterBuffer {
        RasterBuffer::new(RgbaImage::from_fn(16, 16, |x, y| {
            Rgba([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8, 200])
        }))
        .unwrap()
    }

    fn approx_eq(a: &ColorMatrix, b: &ColorMatrix) -> bool {
        a.0.iter().zip(b.0.iter()).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    fn pixel_after(spec: ColorAdjustmentSpec, color: [u8; 4]) -> [u8; 4] {
        let raster = RasterBuffer::new(RgbaImage::from_pixel(1, 1, Rgba(color))).unwrap();
        adjust(&raster, &spec).pixels().get_pixel(0, 0).0
    }

    // =========================================================================
    // Composition
    // =========================================================================

    #[test]
    fn neutral_spec_composes_to_identity() {
        let spec = ColorAdjustmentSpec::default();
        assert!(spec.is_neutral());
        assert!(approx_eq(&spec.compose(), &ColorMatrix::IDENTITY));
    }

    #[test]
    fn neutral_spec_leaves_pixels_unchanged() {
        let raster = sample();
        assert_eq!(adjust(&raster, &ColorAdjustmentSpec::default()), raster);
    }

    #[test]
    fn identity_is_neutral_for_then() {
        let m = ColorMatrix::sepia();
        assert!(approx_eq(&m.then(&ColorMatrix::IDENTITY), &m));
        assert!(approx_eq(&ColorMatrix::IDENTITY.then(&m), &m));
    }

    #[test]
    fn composition_order_matters() {
        let bc = ColorMatrix::brightness_contrast(0.2, 1.5);
        let sepia = ColorMatrix::sepia();
        assert!(!approx_eq(&bc.then(&sepia), &sepia.then(&bc)));
    }

    #[test]
    fn composite_matches_sequential_application() {
        let spec = ColorAdjustmentSpec {
            brightness: 0.1,
            contrast: 1.2,
            saturation: 0.5,
            hue: 30.0,
            temperature: 0.2,
            tint: -0.1,
            filter: None,
        };
        let composite = spec.compose();
        let sequential = [
            ColorMatrix::brightness_contrast(0.1, 1.2),
            ColorMatrix::saturation(0.5),
            ColorMatrix::hue_rotation(30.0),
            ColorMatrix::temperature(0.2),
            ColorMatrix::tint(-0.1),
        ]
        .iter()
        .fold(ColorMatrix::IDENTITY, |acc, m| acc.then(m));
        assert!(approx_eq(&composite, &sequential));
    }

    #[test]
    fn zero_hue_rotation_is_identity() {
        assert!(approx_eq(&ColorMatrix::hue_rotation(0.0), &ColorMatrix::IDENTITY));
    }

    #[test]
    fn hue_rotation_preserves_gray() {
        let m = ColorMatrix::hue_rotation(120.0);
        assert_eq!(m.transform(Rgba([100, 100, 100, 255])).0, [100, 100, 100, 255]);
    }

    // =========================================================================
    // Individual adjustments
    // =========================================================================

    #[test]
    fn brightness_adds_full_scale_fraction() {
        let spec = ColorAdjustmentSpec {
            brightness: 0.1,
            ..Default::default()
        };
        // 0.1 * 255 = 25.5 → rounds to 26
        assert_eq!(pixel_after(spec, [100, 100, 100, 255]), [126, 126, 126, 255]);
    }

    #[test]
    fn contrast_scales_channels_and_clamps() {
        let spec = ColorAdjustmentSpec {
            contrast: 2.0,
            ..Default::default()
        };
        assert_eq!(pixel_after(spec, [50, 100, 200, 255]), [100, 200, 255, 255]);
    }

    #[test]
    fn zero_saturation_is_grayscale() {
        let spec = ColorAdjustmentSpec {
            saturation: 0.0,
            ..Default::default()
        };
        let [r, g, b, a] = pixel_after(spec, [200, 50, 10, 255]);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 255);
    }

    #[test]
    fn temperature_warms_red_and_cools_blue() {
        let spec = ColorAdjustmentSpec {
            temperature: 1.0,
            ..Default::default()
        };
        assert_eq!(pixel_after(spec, [100, 100, 100, 255]), [150, 100, 50, 255]);
    }

    #[test]
    fn tint_shifts_green() {
        let spec = ColorAdjustmentSpec {
            tint: -0.5,
            ..Default::default()
        };
        assert_eq!(pixel_after(spec, [100, 100, 100, 255]), [100, 75, 100, 255]);
    }

    #[test]
    fn filter_runs_last() {
        let spec = ColorAdjustmentSpec {
            brightness: 0.2,
            filter: Some(ColorMatrix::invert()),
            ..Default::default()
        };
        // brighten 100 → 151, then invert → 104
        assert_eq!(pixel_after(spec, [100, 100, 100, 255]), [104, 104, 104, 255]);
    }

    #[test]
    fn alpha_is_untouched() {
        let spec = ColorAdjustmentSpec {
            brightness: 0.5,
            saturation: 2.0,
            ..Default::default()
        };
        assert_eq!(pixel_after(spec, [10, 20, 30, 77])[3], 77);
    }

    #[test]
    fn out_of_range_parameters_are_clamped() {
        let wild = ColorAdjustmentSpec {
            contrast: 10.0,
            ..Default::default()
        };
        let clamped = ColorAdjustmentSpec {
            contrast: 2.0,
            ..Default::default()
        };
        assert!(approx_eq(&wild.compose(), &clamped.compose()));
    }

    #[test]
    fn apply_does_not_mutate_input() {
        let raster = sample();
        let before = raster.clone();
        let _ = apply(&raster, &ColorMatrix::invert());
        assert_eq!(raster, before);
    }

    #[test]
    fn filter_preset_parses() {
        assert_eq!("Sepia".parse::<FilterPreset>(), Ok(FilterPreset::Sepia));
        assert_eq!("greyscale".parse::<FilterPreset>(), Ok(FilterPreset::Grayscale));
        assert!("vivid".parse::<FilterPreset>().is_err());
    }
}
