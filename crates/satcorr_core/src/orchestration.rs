//! Saturation-corrected speckle contrast: main entry points.
//!
//! This module ties the pipeline together:
//! - Validation of the configuration and the frame sequence
//! - Threshold sweep over all frames (parallel partial sums)
//! - Extrapolation and bias correction for the selected model
//! - Repair of the corrected map

use std::time::Instant;

use ndarray::{Array2, ArrayView2, ArrayView3, Axis};

use crate::config::CorrectionConfig;
use crate::correction::{repair_corrected, RepairStats};
use crate::error::{Error, Result};
use crate::float_trait::{Sample, SpeckleFloat};
use crate::sweep::{sweep_frames, SweepAccumulator, SweepMaps};

// =============================================================================
// Constants
// =============================================================================

/// Environment variable enabling per-stage timing logs
const PROFILE_TIMING_ENV: &str = "SATCORR_PROFILE_TIMING";

// =============================================================================
// Types
// =============================================================================

/// Output maps of a correction run, all with the frame dimensions.
#[derive(Debug, Clone)]
pub struct ContrastMaps<F: SpeckleFloat> {
    /// Sequence-averaged contrast at the primary level (uncorrected).
    pub k_raw: Array2<F>,
    /// Saturation-corrected contrast; finite and non-negative.
    pub k_corrected: Array2<F>,
    /// Sequence-averaged saturated fraction at the primary level, in [0, 1].
    pub saturation_ratio: Array2<F>,
    /// Counts from the repair stage.
    pub stats: RepairStats,
}

impl<F: SpeckleFloat> ContrastMaps<F> {
    /// Map dimensions.
    pub fn dim(&self) -> (usize, usize) {
        self.k_raw.dim()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn resolve_profile_timing() -> bool {
    std::env::var(PROFILE_TIMING_ENV)
        .ok()
        .map(|value| {
            let v = value.trim();
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1e3
}

/// Check the sequence is non-empty and every frame has the first frame's
/// non-zero shape.
fn validate_frames<S>(frames: &[ArrayView2<S>]) -> Result<(usize, usize)> {
    let first = frames.first().ok_or(Error::EmptySequence)?;
    let dim = first.dim();
    if dim.0 == 0 || dim.1 == 0 {
        return Err(Error::EmptyFrame {
            index: 0,
            rows: dim.0,
            cols: dim.1,
        });
    }
    for (index, frame) in frames.iter().enumerate().skip(1) {
        if frame.dim() != dim {
            return Err(Error::DimensionMismatch {
                index,
                expected: dim,
                actual: frame.dim(),
            });
        }
    }
    Ok(dim)
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Empty sweep accumulator for frames of sample type `S` and shape `dim`.
///
/// Frames can be pushed one at a time as they are decoded and the result
/// finished with [`correct_from_sweep`].
pub fn new_sweep_accumulator<S: Sample, F: SpeckleFloat>(
    dim: (usize, usize),
    config: &CorrectionConfig<F>,
) -> Result<SweepAccumulator> {
    config.validate()?;
    let levels: Vec<f64> = config
        .calibration
        .levels(config.model)
        .iter()
        .map(|level| level.as_f64())
        .collect();
    SweepAccumulator::new(
        dim,
        &levels,
        config.ceiling(S::FULL_SCALE),
        config.window_size,
        config.border,
    )
}

/// Correct swept maps and repair the result.
pub fn correct_from_sweep<F: SpeckleFloat>(
    maps: &SweepMaps<F>,
    config: &CorrectionConfig<F>,
) -> Result<ContrastMaps<F>> {
    config.validate()?;
    let profile = resolve_profile_timing();

    let start = Instant::now();
    let corrected = config.model.correct(maps, &config.calibration)?;
    let correct_ms = elapsed_ms(start);

    let start = Instant::now();
    let (k_corrected, stats) = repair_corrected(
        corrected,
        maps.primary_contrast(),
        maps.primary_saturation(),
        &config.calibration,
        &config.inpaint,
    )?;
    let repair_ms = elapsed_ms(start);

    log::debug!("repair: {:?}", stats);
    if profile {
        log::info!(
            "satcorr timing: correction {:.3} ms, repair {:.3} ms",
            correct_ms,
            repair_ms
        );
    }

    Ok(ContrastMaps {
        k_raw: maps.primary_contrast().to_owned(),
        k_corrected,
        saturation_ratio: maps.primary_saturation().to_owned(),
        stats,
    })
}

/// Saturation-corrected local speckle contrast of a frame sequence.
///
/// Frames are widened to f64, swept at every threshold level of the
/// configured model and averaged; the primary-level maps are corrected and
/// repaired. The saturation ceiling defaults to the full scale of `S`.
///
/// # Errors
/// Configuration errors (empty sequence or frame, mismatched shapes, zero
/// window, invalid calibration) abort the run. Numerical degeneracies in the
/// data never do.
pub fn correct_saturated_contrast<S: Sample, F: SpeckleFloat>(
    frames: &[ArrayView2<S>],
    config: &CorrectionConfig<F>,
) -> Result<ContrastMaps<F>> {
    config.validate()?;
    let dim = validate_frames(frames)?;
    let profile = resolve_profile_timing();

    log::info!(
        "correcting {} frames of {}x{} ({:?}, {} iteration(s), window {}, ceiling {})",
        frames.len(),
        dim.0,
        dim.1,
        config.model,
        config.model.iterations(),
        config.window_size,
        config.ceiling(S::FULL_SCALE)
    );

    let start = Instant::now();
    let prototype = new_sweep_accumulator::<S, F>(dim, config)?;
    let maps: SweepMaps<F> = sweep_frames(frames, &prototype)?.finish()?;
    if profile {
        log::info!(
            "satcorr timing: sweep {:.3} ms ({} levels)",
            elapsed_ms(start),
            maps.level_count()
        );
    }

    let result = correct_from_sweep(&maps, config)?;
    log::info!(
        "corrected {}x{}: {} inpainted, {} kept raw",
        dim.0,
        dim.1,
        result.stats.inpainted,
        result.stats.kept_raw
    );
    Ok(result)
}

/// [`correct_saturated_contrast`] for a 3-D stack with frames along axis 0.
pub fn correct_saturated_contrast_stack<S: Sample, F: SpeckleFloat>(
    stack: ArrayView3<S>,
    config: &CorrectionConfig<F>,
) -> Result<ContrastMaps<F>> {
    let frames: Vec<ArrayView2<S>> = stack.axis_iter(Axis(0)).collect();
    correct_saturated_contrast(&frames, config)
}

// =============================================================================
// Tests
// =============================================================================
