//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Ratio comparisons and derived sides use integer arithmetic so that exact
//! ratios (1600×900 into 800 wide → 450 high) never lose a pixel to float
//! rounding.

use super::params::{Dimensions, ResizeSpec};

/// Upper bound for the decode subsampling factor.
const MAX_SAMPLE_SIZE: u32 = 1 << 15;

/// Calculate the power-of-two subsampling factor for a decode.
///
/// Picks the largest factor for which the subsampled image still covers the
/// requested bound on both axes, i.e. `height / f >= bound.height` and
/// `width / f >= bound.width`. A zero bound on an axis means "no constraint"
/// on that axis; a bound of zero on both axes returns 1.
///
/// # Examples
/// ```
/// # use imgpress::imaging::calculations::calculate_sample_size;
/// # use imgpress::imaging::Dimensions;
/// // 4000x3000 into a 1000x750 bound → decode at quarter resolution
/// assert_eq!(calculate_sample_size(Dimensions::new(4000, 3000), Dimensions::new(1000, 750)), 4);
/// ```
pub fn calculate_sample_size(source: Dimensions, bound: Dimensions) -> u32 {
    if bound.width == 0 && bound.height == 0 {
        return 1;
    }

    let mut factor = 1;
    if source.height > bound.height || source.width > bound.width {
        let half_height = source.height / 2;
        let half_width = source.width / 2;
        while factor < MAX_SAMPLE_SIZE
            && half_height / factor >= bound.height
            && half_width / factor >= bound.width
        {
            factor *= 2;
        }
    }
    factor
}

/// Dimensions of a decode performed at `factor`.
pub fn subsampled_dimensions(source: Dimensions, factor: u32) -> Dimensions {
    let factor = factor.max(1);
    Dimensions::new(
        (source.width / factor).max(1),
        (source.height / factor).max(1),
    )
}

/// Calculate output dimensions for a resize request.
///
/// Aspect-fit always lands inside the requested box: the axis whose ratio
/// dominates is pinned to the box, and the other side is derived and
/// rounded down.
///
/// # Examples
/// ```
/// # use imgpress::imaging::calculations::calculate_resize_dimensions;
/// # use imgpress::imaging::{Dimensions, ResizeSpec};
/// let spec = ResizeSpec { width: Some(800), height: Some(600), maintain_aspect: true };
/// // 16:9 source into a 4:3 box is width-bound
/// assert_eq!(
///     calculate_resize_dimensions(Dimensions::new(1600, 900), &spec),
///     Dimensions::new(800, 450)
/// );
/// ```
pub fn calculate_resize_dimensions(original: Dimensions, spec: &ResizeSpec) -> Dimensions {
    let (w, h) = (original.width as u64, original.height as u64);

    let (out_w, out_h) = match (spec.width, spec.height) {
        (Some(tw), Some(th)) if spec.maintain_aspect => {
            let (tw, th) = (tw as u64, th as u64);
            // original ratio > target ratio  ⇔  w * th > tw * h
            if w * th > tw * h {
                (tw, tw * h / w)
            } else {
                (th * w / h, th)
            }
        }
        (Some(tw), Some(th)) => (tw as u64, th as u64),
        (Some(tw), None) => (tw as u64, tw as u64 * h / w),
        (None, Some(th)) => (th as u64 * w / h, th as u64),
        (None, None) => (w, h),
    };

    Dimensions::new(clamp_side(out_w), clamp_side(out_h))
}

/// The bound the decoder should respect for a resize request, if any.
///
/// An unspecified side is reported as 0 ("no constraint").
pub fn decode_bound(spec: &ResizeSpec) -> Option<Dimensions> {
    if spec.is_passthrough() {
        return None;
    }
    Some(Dimensions::new(
        spec.width.unwrap_or(0),
        spec.height.unwrap_or(0),
    ))
}

/// Bounding box of a raster rotated by `degrees` around its center.
pub fn rotated_bounds(original: Dimensions, degrees: f64) -> Dimensions {
    let radians = degrees.to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let (w, h) = (original.width as f64, original.height as f64);

    // Trim float noise so 90° of a 300x200 gives 200x300, not 201x301.
    let width = (w * cos + h * sin - 1e-6).ceil();
    let height = (w * sin + h * cos - 1e-6).ceil();
    Dimensions::new(clamp_side(width as u64), clamp_side(height as u64))
}

/// Scale both sides by `factor`, rounding down.
pub fn scale_dimensions(original: Dimensions, factor: f64) -> Dimensions {
    let scale = |side: u32| (side as f64 * factor + 1e-9).floor() as u32;
    Dimensions::new(scale(original.width), scale(original.height))
}

fn clamp_side(value: u64) -> u32 {
    value.clamp(1, u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(w: u32, h: u32) -> Dimensions {
        Dimensions::new(w, h)
    }

    fn fit(w: u32, h: u32) -> ResizeSpec {
        ResizeSpec {
            width: Some(w),
            height: Some(h),
            maintain_aspect: true,
        }
    }

    // =========================================================================
    // calculate_sample_size tests
    // =========================================================================

    #[test]
    fn sample_size_one_when_source_within_bound() {
        assert_eq!(calculate_sample_size(dims(800, 600), dims(800, 600)), 1);
        assert_eq!(calculate_sample_size(dims(400, 300), dims(800, 600)), 1);
    }

    #[test]
    fn sample_size_picks_coarsest_that_still_covers_bound() {
        // 4000x3000 → /4 = 1000x750 still covers 1000x750, /8 would not
        assert_eq!(calculate_sample_size(dims(4000, 3000), dims(1000, 750)), 4);
        // 4000x3000 → /2 = 2000x1500 covers 1100x800, /4 = 1000x750 does not
        assert_eq!(calculate_sample_size(dims(4000, 3000), dims(1100, 800)), 2);
    }

    #[test]
    fn sample_size_never_undershoots_either_axis() {
        let source = dims(6000, 1000);
        let bound = dims(500, 400);
        let factor = calculate_sample_size(source, bound);
        let decoded = subsampled_dimensions(source, factor);
        assert!(decoded.width >= bound.width);
        assert!(decoded.height >= bound.height);
        assert_eq!(factor, 2);
    }

    #[test]
    fn sample_size_single_axis_bound() {
        // Only a width bound of 500: 4000 → 500 at /8
        assert_eq!(calculate_sample_size(dims(4000, 3000), dims(500, 0)), 8);
    }

    #[test]
    fn sample_size_no_bound_is_one() {
        assert_eq!(calculate_sample_size(dims(4000, 3000), dims(0, 0)), 1);
    }

    #[test]
    fn sample_size_is_power_of_two() {
        for (w, h) in [(5000, 5000), (1234, 4321), (10_000, 20)] {
            let f = calculate_sample_size(dims(w, h), dims(10, 10));
            assert!(f.is_power_of_two(), "{f} for {w}x{h}");
        }
    }

    // =========================================================================
    // calculate_resize_dimensions tests
    // =========================================================================

    #[test]
    fn fit_width_bound_when_source_is_wider() {
        assert_eq!(
            calculate_resize_dimensions(dims(1600, 900), &fit(800, 600)),
            dims(800, 450)
        );
    }

    #[test]
    fn fit_height_bound_when_source_is_taller() {
        // 900x1600 into 800x600 → height pinned at 600, width 600 * 0.5625 = 337
        assert_eq!(
            calculate_resize_dimensions(dims(900, 1600), &fit(800, 600)),
            dims(337, 600)
        );
    }

    #[test]
    fn fit_same_ratio_is_exact() {
        assert_eq!(
            calculate_resize_dimensions(dims(800, 600), &fit(400, 300)),
            dims(400, 300)
        );
    }

    #[test]
    fn fit_never_exceeds_box() {
        let sources = [(1600, 900), (901, 1601), (333, 777), (1000, 1), (1, 1000)];
        let boxes = [(800, 600), (123, 457), (1, 1), (5000, 20)];
        for &(sw, sh) in &sources {
            for &(bw, bh) in &boxes {
                let out = calculate_resize_dimensions(dims(sw, sh), &fit(bw, bh));
                assert!(out.width <= bw, "{sw}x{sh} in {bw}x{bh} → {out:?}");
                assert!(out.height <= bh, "{sw}x{sh} in {bw}x{bh} → {out:?}");
            }
        }
    }

    #[test]
    fn stretch_uses_exact_box() {
        let spec = ResizeSpec {
            width: Some(300),
            height: Some(300),
            maintain_aspect: false,
        };
        assert_eq!(calculate_resize_dimensions(dims(1600, 900), &spec), dims(300, 300));
    }

    #[test]
    fn width_only_derives_height() {
        let spec = ResizeSpec {
            width: Some(400),
            ..ResizeSpec::default()
        };
        assert_eq!(calculate_resize_dimensions(dims(1600, 900), &spec), dims(400, 225));
    }

    #[test]
    fn height_only_derives_width() {
        let spec = ResizeSpec {
            height: Some(300),
            ..ResizeSpec::default()
        };
        assert_eq!(calculate_resize_dimensions(dims(1600, 900), &spec), dims(533, 300));
    }

    #[test]
    fn no_dimensions_passes_through() {
        assert_eq!(
            calculate_resize_dimensions(dims(1600, 900), &ResizeSpec::default()),
            dims(1600, 900)
        );
    }

    #[test]
    fn derived_side_never_zero() {
        let spec = ResizeSpec {
            width: Some(10),
            ..ResizeSpec::default()
        };
        assert_eq!(calculate_resize_dimensions(dims(10_000, 10), &spec), dims(10, 1));
    }

    // =========================================================================
    // decode_bound / rotated_bounds / scale_dimensions tests
    // =========================================================================

    #[test]
    fn decode_bound_fills_missing_side_with_zero() {
        let spec = ResizeSpec {
            height: Some(300),
            ..ResizeSpec::default()
        };
        assert_eq!(decode_bound(&spec), Some(dims(0, 300)));
        assert_eq!(decode_bound(&ResizeSpec::default()), None);
    }

    #[test]
    fn rotated_bounds_quarter_turn_swaps_sides() {
        assert_eq!(rotated_bounds(dims(300, 200), 90.0), dims(200, 300));
        assert_eq!(rotated_bounds(dims(300, 200), 180.0), dims(300, 200));
        assert_eq!(rotated_bounds(dims(300, 200), -90.0), dims(200, 300));
    }

    #[test]
    fn rotated_bounds_45_degrees_grows_box() {
        // 100x100 at 45° → diagonal ≈ 141.42
        assert_eq!(rotated_bounds(dims(100, 100), 45.0), dims(142, 142));
    }

    #[test]
    fn scale_dimensions_rounds_down() {
        assert_eq!(scale_dimensions(dims(1000, 333), 0.7), dims(700, 233));
        assert_eq!(scale_dimensions(dims(71, 71), 0.7), dims(49, 49));
    }
}
