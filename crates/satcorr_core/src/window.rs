//! Windowed statistics over square neighborhoods.
//!
//! Local mean and population standard deviation are computed with a
//! separable box sum over rows then columns. Every reduction in this module
//! accumulates in f64, whatever precision the caller finally stores, so that
//! squared 16-bit intensities summed over a window keep their integer
//! precision.
//!
//! The border is extended according to [`BorderMode`]. Mean, variance and
//! saturation ratio all go through [`local_mean`], so they always see the
//! same extension; mixing policies silently biases contrast at the border.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::config::BorderMode;

// =============================================================================
// Constants
// =============================================================================

/// Minimum lane count for parallel processing of a box-sum pass.
/// Set high to avoid rayon overhead for smaller arrays.
const PARALLEL_ROW_THRESHOLD: usize = 512;

/// Variance below `mean² * VARIANCE_ROUNDOFF` is cancellation noise of
/// `E[x²] - E[x]²` and is snapped to zero.
const VARIANCE_ROUNDOFF: f64 = 1e-12;

/// Local mean and population standard deviation of a frame.
#[derive(Debug, Clone)]
pub struct WindowStats {
    pub mean: Array2<f64>,
    pub std: Array2<f64>,
}

impl WindowStats {
    /// Local contrast `std / mean`. A zero mean gives NaN or infinity.
    pub fn contrast(&self) -> Array2<f64> {
        let mut contrast = self.std.clone();
        contrast.zip_mut_with(&self.mean, |s, &m| *s /= m);
        contrast
    }
}

/// Samples before and after the center pixel covered by a window.
/// Even windows extend one sample further before the center.
#[inline]
pub fn window_extent(window: usize) -> (usize, usize) {
    let before = window / 2;
    (before, window.saturating_sub(1 + before))
}

/// Symmetric reflection of an out-of-range index (edge sample repeated).
/// reflect(-1) = 0, reflect(-2) = 1, reflect(n) = n-1, reflect(n+1) = n-2.
/// The extension is periodic with period 2n, so offsets of any size stay
/// on the mirror.
#[inline(always)]
fn reflect_index(idx: isize, len: usize) -> usize {
    let n = len as isize;
    let m = idx.rem_euclid(2 * n);
    if m < n {
        m as usize
    } else {
        (2 * n - 1 - m) as usize
    }
}

/// Fill a pre-allocated padded buffer with the lane and its border extension.
/// Reusing the buffer keeps the hot loop allocation free.
#[inline]
fn fill_padded_lane(
    lane: &[f64],
    before: usize,
    after: usize,
    border: BorderMode,
    padded: &mut Vec<f64>,
) {
    let n = lane.len();
    padded.clear();
    match border {
        BorderMode::Reflect => {
            padded.extend((0..before).map(|i| lane[reflect_index(i as isize - before as isize, n)]));
            padded.extend_from_slice(lane);
            padded.extend((0..after).map(|i| lane[reflect_index((n + i) as isize, n)]));
        }
        BorderMode::Zero | BorderMode::Truncate => {
            padded.resize(before, 0.0);
            padded.extend_from_slice(lane);
            padded.resize(before + n + after, 0.0);
        }
    }
}

/// Sum each window of a padded lane into the output lane.
#[inline]
fn sum_padded_lane<'a>(padded: &[f64], window: usize, output: impl Iterator<Item = &'a mut f64>) {
    for (i, out) in output.enumerate() {
        *out = padded[i..i + window].iter().sum();
    }
}

/// Box sum along axis 1 (within each row).
fn box_sum_rows(input: ArrayView2<f64>, window: usize, border: BorderMode) -> Array2<f64> {
    let (rows, cols) = input.dim();
    let (before, after) = window_extent(window);
    let mut output = Array2::zeros((rows, cols));

    if rows == 0 || cols == 0 {
        return output;
    }

    if rows >= PARALLEL_ROW_THRESHOLD {
        let output_rows: Vec<_> = output.axis_iter_mut(Axis(0)).collect();
        let input_rows: Vec<_> = input.axis_iter(Axis(0)).collect();

        output_rows
            .into_par_iter()
            .zip(input_rows.into_par_iter())
            .for_each(|(mut out_row, in_row)| {
                let lane: Vec<f64> = in_row.iter().copied().collect();
                let mut padded = Vec::with_capacity(cols + before + after);
                fill_padded_lane(&lane, before, after, border, &mut padded);
                sum_padded_lane(&padded, window, out_row.iter_mut());
            });
    } else {
        let mut lane = Vec::with_capacity(cols);
        let mut padded = Vec::with_capacity(cols + before + after);

        for (mut out_row, in_row) in output
            .axis_iter_mut(Axis(0))
            .zip(input.axis_iter(Axis(0)))
        {
            lane.clear();
            lane.extend(in_row.iter().copied());
            fill_padded_lane(&lane, before, after, border, &mut padded);
            sum_padded_lane(&padded, window, out_row.iter_mut());
        }
    }

    output
}

/// Sum over the `window × window` neighborhood of every pixel ("same" size).
pub fn box_sum(input: ArrayView2<f64>, window: usize, border: BorderMode) -> Array2<f64> {
    let horizontal = box_sum_rows(input, window, border);
    box_sum_rows(horizontal.t(), window, border).reversed_axes()
}

/// Number of in-frame samples covered by the window at each lane position.
fn lane_counts(len: usize, window: usize) -> Array1<f64> {
    let (before, after) = window_extent(window);
    Array1::from_shape_fn(len, |i| {
        let lo = i.saturating_sub(before);
        let hi = (i + after).min(len - 1);
        (hi - lo + 1) as f64
    })
}

/// Per-pixel normalizer turning a box sum into a mean.
fn window_normalizer(dim: (usize, usize), window: usize, border: BorderMode) -> Array2<f64> {
    let (rows, cols) = dim;
    match border {
        BorderMode::Reflect | BorderMode::Zero => {
            Array2::from_elem(dim, (window * window) as f64)
        }
        BorderMode::Truncate => {
            if rows == 0 || cols == 0 {
                return Array2::zeros(dim);
            }
            let row_counts = lane_counts(rows, window);
            let col_counts = lane_counts(cols, window);
            Array2::from_shape_fn(dim, |(r, c)| row_counts[r] * col_counts[c])
        }
    }
}

/// Normalized box filter: mean over the window around each pixel.
pub fn local_mean(input: ArrayView2<f64>, window: usize, border: BorderMode) -> Array2<f64> {
    let mut mean = box_sum(input, window, border);
    let normalizer = window_normalizer(input.dim(), window, border);
    mean.zip_mut_with(&normalizer, |m, &n| *m /= n);
    mean
}

/// Local mean and population standard deviation over the window.
pub fn window_statistics(frame: ArrayView2<f64>, window: usize, border: BorderMode) -> WindowStats {
    let squares = frame.mapv(|v| v * v);
    let mean = local_mean(frame, window, border);
    let mut std = local_mean(squares.view(), window, border);

    std.zip_mut_with(&mean, |s, &m| {
        let mean_sq = m * m;
        let var = *s - mean_sq;
        *s = if var <= mean_sq * VARIANCE_ROUNDOFF {
            0.0
        } else {
            var.sqrt()
        };
    });

    WindowStats { mean, std }
}

/// Local contrast `std / mean` of a frame.
pub fn local_contrast(frame: ArrayView2<f64>, window: usize, border: BorderMode) -> Array2<f64> {
    window_statistics(frame, window, border).contrast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.gen::<f64>() * 100.0)
    }

    /// Direct (non-separable) reference with explicit border handling.
    fn naive_stats(
        frame: &Array2<f64>,
        window: usize,
        border: BorderMode,
    ) -> (Array2<f64>, Array2<f64>) {
        let (rows, cols) = frame.dim();
        let (before, after) = window_extent(window);
        let mut mean = Array2::zeros((rows, cols));
        let mut std = Array2::zeros((rows, cols));
        for r in 0..rows {
            for c in 0..cols {
                let mut values = Vec::new();
                for dr in -(before as isize)..=(after as isize) {
                    for dc in -(before as isize)..=(after as isize) {
                        let rr = r as isize + dr;
                        let cc = c as isize + dc;
                        let inside = rr >= 0 && cc >= 0 && rr < rows as isize && cc < cols as isize;
                        match border {
                            BorderMode::Reflect => values.push(
                                frame[[reflect_index(rr, rows), reflect_index(cc, cols)]],
                            ),
                            BorderMode::Zero => values.push(if inside {
                                frame[[rr as usize, cc as usize]]
                            } else {
                                0.0
                            }),
                            BorderMode::Truncate => {
                                if inside {
                                    values.push(frame[[rr as usize, cc as usize]]);
                                }
                            }
                        }
                    }
                }
                let n = values.len() as f64;
                let m = values.iter().sum::<f64>() / n;
                let v = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
                mean[[r, c]] = m;
                std[[r, c]] = v.sqrt();
            }
        }
        (mean, std)
    }

    #[test]
    fn test_reflect_index() {
        assert_eq!(reflect_index(-1, 5), 0);
        assert_eq!(reflect_index(-2, 5), 1);
        assert_eq!(reflect_index(5, 5), 4);
        assert_eq!(reflect_index(6, 5), 3);
        assert_eq!(reflect_index(2, 5), 2);
        assert_eq!(reflect_index(-4, 1), 0);
        assert_eq!(reflect_index(4, 1), 0);
    }

    #[test]
    fn test_reflect_index_beyond_one_period() {
        // Lane [a b c]: ... c b a | a b c | c b a | a b c ...
        let expected = [0, 1, 2, 2, 1, 0];
        for idx in -12isize..12 {
            assert_eq!(reflect_index(idx, 3), expected[idx.rem_euclid(6) as usize], "idx {}", idx);
        }
        assert_eq!(reflect_index(-7, 3), 0);
        assert_eq!(reflect_index(8, 3), 2);
        assert_eq!(reflect_index(9, 3), 2);
    }

    #[test]
    fn test_reflect_wide_window_uses_mirrored_samples() {
        // Window 7 on a 2-wide lane [1, 3]: periodic mirror 3 1 1 3 3 1 | 1 3 | 3 1 1 3 3 1
        let frame = Array2::from_shape_vec((1, 2), vec![1.0, 3.0]).unwrap();
        let summed = box_sum_rows(frame.view(), 7, BorderMode::Reflect);
        // Column 0 covers offsets -3..=3: 3 3 1 | 1 3 | 3 1 = 15
        assert!(approx_eq(summed[[0, 0]], 15.0, 1e-12));
        // Column 1 covers offsets -2..=4: 3 1 | 1 3 | 3 1 1 = 13
        assert!(approx_eq(summed[[0, 1]], 13.0, 1e-12));
    }

    #[test]
    fn test_window_extent() {
        assert_eq!(window_extent(1), (0, 0));
        assert_eq!(window_extent(3), (1, 1));
        assert_eq!(window_extent(7), (3, 3));
        assert_eq!(window_extent(4), (2, 1));
    }

    #[test]
    fn test_matches_naive_all_borders() {
        let frame = random_matrix(13, 17, 42);
        for border in [BorderMode::Reflect, BorderMode::Zero, BorderMode::Truncate] {
            for window in [1, 3, 4, 7] {
                let stats = window_statistics(frame.view(), window, border);
                let (mean, std) = naive_stats(&frame, window, border);
                for ((a, b), (c, d)) in stats
                    .mean
                    .iter()
                    .zip(mean.iter())
                    .zip(stats.std.iter().zip(std.iter()))
                {
                    assert!(approx_eq(*a, *b, 1e-9), "{:?} N={} mean {} vs {}", border, window, a, b);
                    assert!(approx_eq(*c, *d, 1e-6), "{:?} N={} std {} vs {}", border, window, c, d);
                }
            }
        }
    }

    #[test]
    fn test_same_shape() {
        let frame = random_matrix(9, 31, 7);
        let stats = window_statistics(frame.view(), 5, BorderMode::Reflect);
        assert_eq!(stats.mean.dim(), (9, 31));
        assert_eq!(stats.std.dim(), (9, 31));
    }

    #[test]
    fn test_flat_frame_zero_std() {
        let frame = Array2::from_elem((8, 8), 255.0);
        for border in [BorderMode::Reflect, BorderMode::Truncate] {
            let stats = window_statistics(frame.view(), 3, border);
            assert!(stats.std.iter().all(|&s| s == 0.0));
            assert!(stats.mean.iter().all(|&m| approx_eq(m, 255.0, 1e-9)));
            assert!(stats.contrast().iter().all(|&k| k == 0.0));
        }
    }

    #[test]
    fn test_zero_border_biases_flat_frame_edges() {
        let frame = Array2::from_elem((6, 6), 10.0);
        let stats = window_statistics(frame.view(), 3, BorderMode::Zero);
        // Corner window holds 4 real samples out of 9
        assert!(approx_eq(stats.mean[[0, 0]], 40.0 / 9.0, 1e-9));
        assert!(stats.std[[0, 0]] > 0.0);
        // Interior is unaffected
        assert_eq!(stats.std[[3, 3]], 0.0);
    }

    #[test]
    fn test_zero_mean_contrast_is_unguarded() {
        let frame = Array2::zeros((5, 5));
        let contrast = local_contrast(frame.view(), 3, BorderMode::Reflect);
        assert!(contrast.iter().all(|k| k.is_nan()));
    }

    #[test]
    fn test_window_larger_than_frame() {
        let frame = random_matrix(3, 2, 11);
        for border in [BorderMode::Reflect, BorderMode::Zero, BorderMode::Truncate] {
            let stats = window_statistics(frame.view(), 9, border);
            assert_eq!(stats.mean.dim(), (3, 2));
            assert!(stats.mean.iter().all(|m| m.is_finite()));
        }
    }

    #[test]
    fn test_parallel_path_matches_sequential_rows() {
        // Taller than the parallel threshold exercises the rayon path
        let frame = random_matrix(PARALLEL_ROW_THRESHOLD + 3, 6, 5);
        let summed = box_sum(frame.view(), 3, BorderMode::Zero);
        let r = 100;
        let c = 2;
        let mut expected = 0.0;
        for rr in r - 1..=r + 1 {
            for cc in c - 1..=c + 1 {
                expected += frame[[rr, cc]];
            }
        }
        assert!(approx_eq(summed[[r, c]], expected, 1e-9));
    }
}
