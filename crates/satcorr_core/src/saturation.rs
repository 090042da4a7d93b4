//! Local saturated-pixel fraction.

use ndarray::{Array2, ArrayView2};

use crate::config::BorderMode;
use crate::window::local_mean;

/// Fraction of pixels in the window around each pixel whose value is at or
/// above `ceiling`.
///
/// Uses the same window and border extension as the contrast statistics, so
/// that R and K describe the same neighborhood. Values lie in [0, 1].
pub fn saturated_fraction(
    frame: ArrayView2<f64>,
    ceiling: f64,
    window: usize,
    border: BorderMode,
) -> Array2<f64> {
    let indicator = frame.mapv(|v| if v >= ceiling { 1.0 } else { 0.0 });
    let mut ratio = local_mean(indicator.view(), window, border);
    // Box sums of 0/1 are exact, but the division can land a hair above 1
    ratio.mapv_inplace(|r| r.clamp(0.0, 1.0));
    ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_all_saturated_is_one() {
        let frame = Array2::from_elem((6, 7), 255.0);
        for border in [BorderMode::Reflect, BorderMode::Truncate] {
            let ratio = saturated_fraction(frame.view(), 255.0, 3, border);
            assert!(ratio.iter().all(|&r| r == 1.0));
        }
    }

    #[test]
    fn test_unsaturated_is_zero() {
        let frame = Array2::from_shape_fn((6, 6), |(r, c)| (r * 6 + c) as f64);
        let ratio = saturated_fraction(frame.view(), 255.0, 5, BorderMode::Reflect);
        assert!(ratio.iter().all(|&r| r == 0.0));
    }

    #[test]
    fn test_single_saturated_pixel_spreads_over_window() {
        let mut frame = Array2::from_elem((7, 7), 10.0);
        frame[[3, 3]] = 255.0;
        let ratio = saturated_fraction(frame.view(), 255.0, 3, BorderMode::Reflect);

        for r in 0..7 {
            for c in 0..7 {
                let near = (r as isize - 3).abs() <= 1 && (c as isize - 3).abs() <= 1;
                let expected = if near { 1.0 / 9.0 } else { 0.0 };
                assert!(approx_eq(ratio[[r, c]], expected, 1e-12), "({}, {})", r, c);
            }
        }
    }

    #[test]
    fn test_lower_ceiling_never_decreases_ratio() {
        let frame = Array2::from_shape_fn((10, 10), |(r, c)| ((r * 37 + c * 11) % 256) as f64);
        let high = saturated_fraction(frame.view(), 255.0, 3, BorderMode::Reflect);
        let mid = saturated_fraction(frame.view(), 204.0, 3, BorderMode::Reflect);
        let low = saturated_fraction(frame.view(), 153.0, 3, BorderMode::Reflect);

        for ((h, m), l) in high.iter().zip(mid.iter()).zip(low.iter()) {
            assert!(h <= m && m <= l);
            assert!(*l <= 1.0);
        }
    }

    #[test]
    fn test_at_ceiling_counts_as_saturated() {
        let frame = Array2::from_elem((3, 3), 1.0);
        let ratio = saturated_fraction(frame.view(), 1.0, 1, BorderMode::Reflect);
        assert!(ratio.iter().all(|&r| r == 1.0));
    }
}
