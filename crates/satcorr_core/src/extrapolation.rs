//! Extrapolation of squared contrast to zero saturation.
//!
//! Across the synthetic threshold levels the bias of K² is modeled as
//! locally linear in the saturation ratio R. Given samples (R₀, K₀²) and
//! (R₁, K₁²), the value at R = 0 is
//!
//! ```text
//! K_A = K₀² − R₀·(K₁² − K₀²)/(R₁ − R₀ + ε)
//! ```
//!
//! With a third level the same step is taken one level up (K_B from levels
//! 1 and 2) and the two estimates are extrapolated once more:
//!
//! ```text
//! K_C = | K_A − R₀·(K_B − K_A)/(R₁ − R₀ + ε) |
//! ```
//!
//! The slope K_B − K_A can change sign near an inflection of the R ↦ K²
//! curve; the absolute value keeps the nested estimate from inverting.
//! Results stay in the squared domain.

use ndarray::Array2;

use crate::float_trait::SpeckleFloat;
use crate::sweep::SweepMaps;

/// Linear extrapolation to R = 0 of two squared-domain samples.
#[inline]
pub fn extrapolate_to_zero<F: SpeckleFloat>(s0: F, s1: F, r0: F, r1: F, epsilon: F) -> F {
    s0 - r0 * (s1 - s0) / (r1 - r0 + epsilon)
}

/// First-order estimate K_A of the unsaturated K² from two levels.
#[inline]
pub fn single_extrapolation<F: SpeckleFloat>(k: [F; 2], r: [F; 2], epsilon: F) -> F {
    extrapolate_to_zero(k[0] * k[0], k[1] * k[1], r[0], r[1], epsilon)
}

/// Nested estimate |K_C| of the unsaturated K² from three levels.
#[inline]
pub fn nested_extrapolation<F: SpeckleFloat>(k: [F; 3], r: [F; 3], epsilon: F) -> F {
    let k_sq = [k[0] * k[0], k[1] * k[1], k[2] * k[2]];
    let k_a = extrapolate_to_zero(k_sq[0], k_sq[1], r[0], r[1], epsilon);
    let k_b = extrapolate_to_zero(k_sq[1], k_sq[2], r[1], r[2], epsilon);
    extrapolate_to_zero(k_a, k_b, r[0], r[1], epsilon).abs()
}

/// Extrapolated K² map from the swept levels.
///
/// Two levels give K_A, three or more give the nested |K_C| from the first
/// three. A single level has nothing to extrapolate from and returns K₀².
pub fn extrapolate_squared_contrast<F: SpeckleFloat>(
    maps: &SweepMaps<F>,
    epsilon: F,
) -> Array2<F> {
    let k = &maps.contrast;
    let r = &maps.saturation;

    match maps.level_count() {
        0 => Array2::zeros((0, 0)),
        1 => k[0].mapv(|v| v * v),
        2 => Array2::from_shape_fn(maps.dim(), |idx| {
            single_extrapolation([k[0][idx], k[1][idx]], [r[0][idx], r[1][idx]], epsilon)
        }),
        _ => Array2::from_shape_fn(maps.dim(), |idx| {
            nested_extrapolation(
                [k[0][idx], k[1][idx], k[2][idx]],
                [r[0][idx], r[1][idx], r[2][idx]],
                epsilon,
            )
        }),
    }
}
