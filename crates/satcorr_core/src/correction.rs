//! Residual bias correction and repair of the corrected contrast map.
//!
//! The corrected map is produced per pixel by the selected
//! [`CorrectionModel`], then repaired so that every returned value is finite
//! and non-negative:
//!
//! 1. pixels with R₀ = 0 and a finite raw contrast keep the raw value,
//! 2. NaN and infinite corrected values fall back to the raw contrast,
//! 3. whatever is still non-finite or below the calibration floor is filled
//!    from the surrounding valid pixels by [`inpaint_masked`].

use ndarray::{Array2, ArrayView2, Zip};

use crate::config::{Calibration, CorrectionModel, InpaintConfig};
use crate::error::{Error, Result};
use crate::extrapolation::extrapolate_squared_contrast;
use crate::float_trait::SpeckleFloat;
use crate::inpaint::inpaint_masked;
use crate::sweep::SweepMaps;

/// Pixel counts collected while repairing a corrected map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// NaN corrected values replaced by the raw contrast.
    pub nan_replaced: usize,
    /// Infinite corrected values replaced by the raw contrast.
    pub inf_replaced: usize,
    /// Pixels filled by diffusion from valid neighbors.
    pub inpainted: usize,
    /// Unsaturated pixels (R₀ = 0) that keep the raw contrast.
    pub kept_raw: usize,
    /// Pixels set without any valid neighbor to fill from.
    pub unanchored: usize,
    /// Relaxation sweeps used by the fill.
    pub fill_iterations: usize,
}

/// One-step rational correction of the raw contrast.
///
/// `K = K_raw / (1 − R₀ + ε) · (1 + c1·R₀) / (1 + q1·R₀ + q2·R₀²)`
#[inline]
pub fn rational_correction<F: SpeckleFloat>(k_raw: F, r0: F, calibration: &Calibration<F>) -> F {
    let one = F::one();
    let numerator = one + calibration.c1 * r0;
    let denominator = one + calibration.q1 * r0 + calibration.q2 * r0 * r0;
    k_raw / (one - r0 + calibration.epsilon) * numerator / denominator
}

/// Quadratic correction of an extrapolated K², returned in contrast units.
///
/// `K = sqrt(K_ext + R₀/(1 + K_ext)·K_ext²)`. A negative argument yields NaN,
/// which the repair stage replaces.
#[inline]
pub fn quadratic_correction<F: SpeckleFloat>(k_ext: F, r0: F) -> F {
    let k_d = k_ext + r0 / (F::one() + k_ext) * k_ext * k_ext;
    k_d.sqrt()
}

impl CorrectionModel {
    /// Unrepaired corrected contrast from the swept maps.
    ///
    /// `OneStep` only reads the primary level; `TwoStep` needs at least two.
    /// Inconsistent maps are rejected before any pixel is touched.
    pub fn correct<F: SpeckleFloat>(
        self,
        maps: &SweepMaps<F>,
        calibration: &Calibration<F>,
    ) -> Result<Array2<F>> {
        maps.validate()?;
        let r0 = maps.primary_saturation();

        match self {
            CorrectionModel::OneStep => {
                let mut out = maps.primary_contrast().to_owned();
                Zip::from(&mut out)
                    .and(&r0)
                    .for_each(|k, &r| *k = rational_correction(*k, r, calibration));
                Ok(out)
            }
            CorrectionModel::TwoStep => {
                if maps.level_count() < 2 {
                    return Err(Error::InvalidConfig(format!(
                        "two-step correction needs at least 2 threshold levels, got {}",
                        maps.level_count()
                    )));
                }
                let mut out = extrapolate_squared_contrast(maps, calibration.epsilon);
                Zip::from(&mut out)
                    .and(&r0)
                    .for_each(|k, &r| *k = quadratic_correction(*k, r));
                Ok(out)
            }
        }
    }
}

/// Repair a corrected map against the raw contrast and primary saturation.
///
/// The returned map is finite and non-negative everywhere.
pub fn repair_corrected<F: SpeckleFloat>(
    mut corrected: Array2<F>,
    k_raw: ArrayView2<F>,
    r0: ArrayView2<F>,
    calibration: &Calibration<F>,
    inpaint: &InpaintConfig<F>,
) -> Result<(Array2<F>, RepairStats)> {
    let dim = corrected.dim();
    for actual in [k_raw.dim(), r0.dim()] {
        if actual != dim {
            return Err(Error::DimensionMismatch {
                index: 0,
                expected: dim,
                actual,
            });
        }
    }

    let floor = calibration.floor;
    let mut stats = RepairStats::default();
    let mut invalid = Array2::from_elem(dim, false);

    Zip::from(&mut corrected)
        .and(&mut invalid)
        .and(&k_raw)
        .and(&r0)
        .for_each(|k, bad, &raw, &r| {
            if r == F::zero() && raw.is_finite() {
                *k = raw;
                stats.kept_raw += 1;
                return;
            }
            if k.is_nan() {
                *k = raw;
                stats.nan_replaced += 1;
            } else if k.is_infinite() {
                *k = raw;
                stats.inf_replaced += 1;
            }
            *bad = !k.is_finite() || *k < floor;
        });

    let holes = invalid.iter().filter(|&&bad| bad).count();
    if holes == 0 {
        return Ok((corrected, stats));
    }

    if holes == corrected.len() {
        // Nothing valid to diffuse from
        log::warn!(
            "repair: no valid corrected pixel, keeping raw contrast for {} pixels",
            holes
        );
        Zip::from(&mut corrected).and(&k_raw).for_each(|k, &raw| {
            *k = if raw.is_finite() && raw >= F::zero() {
                raw
            } else {
                F::zero()
            };
        });
        stats.unanchored = holes;
        return Ok((corrected, stats));
    }

    let fill = inpaint_masked(corrected.view(), invalid.view(), inpaint)?;
    stats.inpainted = fill.filled;
    stats.fill_iterations = fill.iterations;

    let mut repaired = fill.values;
    repaired.mapv_inplace(|v| if v.is_finite() { v.max(F::zero()) } else { F::zero() });
    Ok((repaired, stats))
}
