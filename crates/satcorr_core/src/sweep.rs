//! Threshold sweep: contrast and saturation ratio at synthetic ceilings.
//!
//! Each frame is viewed at every configured threshold level τ: pixels at or
//! above `τ·ceiling` are clamped to that value before the local contrast is
//! computed, and the local fraction of such pixels is recorded. Sums over the
//! sequence are kept in f64 and divided by the frame count on
//! [`SweepAccumulator::finish`].
//!
//! Accumulation is a plain sum, so frames may be pushed in any order and
//! partial accumulators built on different threads merge into the same
//! result up to floating-point summation order.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::config::BorderMode;
use crate::error::{Error, Result};
use crate::float_trait::{Sample, SpeckleFloat};
use crate::saturation::saturated_fraction;
use crate::window::local_contrast;

/// Local contrast of a frame after clamping it at `ceiling`.
pub fn clamped_contrast(
    frame: ArrayView2<f64>,
    ceiling: f64,
    window: usize,
    border: BorderMode,
) -> Array2<f64> {
    let clamped = frame.mapv(|v| if v >= ceiling { ceiling } else { v });
    local_contrast(clamped.view(), window, border)
}

/// Sequence-averaged maps, one per threshold level.
///
/// Index 0 is the primary level (τ = 1.0 with the default calibration).
#[derive(Debug, Clone)]
pub struct SweepMaps<F: SpeckleFloat> {
    /// Threshold levels as fractions of the saturation ceiling.
    pub levels: Vec<F>,
    /// Averaged contrast K per level.
    pub contrast: Vec<Array2<F>>,
    /// Averaged saturation ratio R per level.
    pub saturation: Vec<Array2<F>>,
    /// Number of frames averaged.
    pub frame_count: usize,
}

impl<F: SpeckleFloat> SweepMaps<F> {
    /// Map dimensions.
    pub fn dim(&self) -> (usize, usize) {
        self.contrast
            .first()
            .map(|k| k.dim())
            .unwrap_or((0, 0))
    }

    /// Number of threshold levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Contrast at the primary level (the uncorrected estimate).
    pub fn primary_contrast(&self) -> ArrayView2<'_, F> {
        self.contrast[0].view()
    }

    /// Saturation ratio at the primary level.
    pub fn primary_saturation(&self) -> ArrayView2<'_, F> {
        self.saturation[0].view()
    }

    /// Check that levels and maps line up and every map has one non-empty
    /// shape. Maps built by [`SweepAccumulator::finish`] always pass.
    pub fn validate(&self) -> Result<()> {
        let levels = self.levels.len();
        if levels == 0 {
            return Err(Error::InvalidConfig(
                "sweep maps need at least one threshold level".to_string(),
            ));
        }
        if self.contrast.len() != levels || self.saturation.len() != levels {
            return Err(Error::InvalidConfig(format!(
                "sweep maps have {} levels but {} contrast and {} saturation maps",
                levels,
                self.contrast.len(),
                self.saturation.len()
            )));
        }

        let dim = self.dim();
        if dim.0 == 0 || dim.1 == 0 {
            return Err(Error::EmptyFrame {
                index: 0,
                rows: dim.0,
                cols: dim.1,
            });
        }
        for map in self.contrast.iter().chain(self.saturation.iter()) {
            if map.dim() != dim {
                return Err(Error::DimensionMismatch {
                    index: 0,
                    expected: dim,
                    actual: map.dim(),
                });
            }
        }
        Ok(())
    }
}

/// Running sums of the per-level contrast and saturation maps.
#[derive(Debug, Clone)]
pub struct SweepAccumulator {
    dim: (usize, usize),
    levels: Vec<f64>,
    ceiling: f64,
    window: usize,
    border: BorderMode,
    contrast_sums: Vec<Array2<f64>>,
    ratio_sums: Vec<Array2<f64>>,
    frames: usize,
}

impl SweepAccumulator {
    /// Empty accumulator for frames of shape `dim`.
    ///
    /// `levels` are fractions of `ceiling`, the first being the primary
    /// level.
    pub fn new(
        dim: (usize, usize),
        levels: &[f64],
        ceiling: f64,
        window: usize,
        border: BorderMode,
    ) -> Result<Self> {
        if window == 0 {
            return Err(Error::InvalidWindow(window));
        }
        if dim.0 == 0 || dim.1 == 0 {
            return Err(Error::EmptyFrame {
                index: 0,
                rows: dim.0,
                cols: dim.1,
            });
        }
        if !(ceiling > 0.0) || !ceiling.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "saturation ceiling must be finite and > 0, got {}",
                ceiling
            )));
        }
        if levels.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one threshold level is required".to_string(),
            ));
        }

        Ok(Self {
            dim,
            levels: levels.to_vec(),
            ceiling,
            window,
            border,
            contrast_sums: vec![Array2::zeros(dim); levels.len()],
            ratio_sums: vec![Array2::zeros(dim); levels.len()],
            frames: 0,
        })
    }

    /// Accumulator with the same parameters and no frames.
    pub fn empty_like(&self) -> Self {
        Self {
            dim: self.dim,
            levels: self.levels.clone(),
            ceiling: self.ceiling,
            window: self.window,
            border: self.border,
            contrast_sums: vec![Array2::zeros(self.dim); self.levels.len()],
            ratio_sums: vec![Array2::zeros(self.dim); self.levels.len()],
            frames: 0,
        }
    }

    /// Number of frames accumulated so far.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Frame shape this accumulator expects.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Add one frame of any supported sample type.
    pub fn push<S: Sample>(&mut self, frame: ArrayView2<S>) -> Result<()> {
        self.check_dim(frame.dim())?;
        let widened = frame.mapv(|s| s.widen());
        self.push_widened(widened.view())
    }

    /// Add one frame already widened to f64.
    pub fn push_widened(&mut self, frame: ArrayView2<f64>) -> Result<()> {
        self.check_dim(frame.dim())?;
        self.accumulate(frame);
        Ok(())
    }

    /// Combine two partial accumulators built with the same parameters.
    pub fn merge(mut self, other: Self) -> Result<Self> {
        if self.dim != other.dim {
            return Err(Error::InvalidConfig(format!(
                "cannot merge accumulators for {:?} and {:?} frames",
                self.dim, other.dim
            )));
        }
        if self.levels != other.levels
            || self.ceiling != other.ceiling
            || self.window != other.window
            || self.border != other.border
        {
            return Err(Error::InvalidConfig(
                "cannot merge accumulators with different sweep parameters".to_string(),
            ));
        }

        for (sum, part) in self.contrast_sums.iter_mut().zip(&other.contrast_sums) {
            *sum += part;
        }
        for (sum, part) in self.ratio_sums.iter_mut().zip(&other.ratio_sums) {
            *sum += part;
        }
        self.frames += other.frames;
        Ok(self)
    }

    /// Divide the sums by the frame count.
    pub fn finish<F: SpeckleFloat>(self) -> Result<SweepMaps<F>> {
        if self.frames == 0 {
            return Err(Error::EmptySequence);
        }
        let count = self.frames as f64;
        let average = |sum: Array2<f64>| sum.mapv(|v| F::from_f64_c(v / count));

        Ok(SweepMaps {
            levels: self.levels.iter().map(|&t| F::from_f64_c(t)).collect(),
            contrast: self.contrast_sums.into_iter().map(average).collect(),
            saturation: self.ratio_sums.into_iter().map(average).collect(),
            frame_count: self.frames,
        })
    }

    fn check_dim(&self, actual: (usize, usize)) -> Result<()> {
        if actual != self.dim {
            return Err(Error::DimensionMismatch {
                index: self.frames,
                expected: self.dim,
                actual,
            });
        }
        Ok(())
    }

    fn accumulate(&mut self, frame: ArrayView2<f64>) {
        for (i, &level) in self.levels.iter().enumerate() {
            let ceiling = level * self.ceiling;
            let contrast = clamped_contrast(frame, ceiling, self.window, self.border);
            self.contrast_sums[i] += &contrast;
            let ratio = saturated_fraction(frame, ceiling, self.window, self.border);
            self.ratio_sums[i] += &ratio;
        }
        self.frames += 1;
    }
}

/// Accumulate a whole sequence in parallel.
///
/// One partial accumulator per rayon worker chunk keeps memory bounded by
/// the thread count; the partials are merged once all frames are consumed.
pub fn sweep_frames<S: Sample>(
    frames: &[ArrayView2<S>],
    prototype: &SweepAccumulator,
) -> Result<SweepAccumulator> {
    if frames.is_empty() {
        return Err(Error::EmptySequence);
    }
    let dim = prototype.dim();
    for (index, frame) in frames.iter().enumerate() {
        if frame.dim() != dim {
            return Err(Error::DimensionMismatch {
                index,
                expected: dim,
                actual: frame.dim(),
            });
        }
    }

    let partial_count = frames.len().min(rayon::current_num_threads().max(1));
    let chunk_len = frames.len().div_ceil(partial_count).max(1);

    let partials: Vec<SweepAccumulator> = frames
        .par_chunks(chunk_len)
        .map(|chunk| -> Result<SweepAccumulator> {
            let mut acc = prototype.empty_like();
            for frame in chunk {
                acc.push(*frame)?;
            }
            Ok(acc)
        })
        .collect::<Result<Vec<_>>>()?;

    partials
        .into_iter()
        .try_fold(prototype.empty_like(), |acc, part| acc.merge(part))
}
