//! Run configuration and calibration parameters.
//!
//! The empirical constants of the bias correction and the synthetic
//! threshold levels are calibration data. They live here with documented
//! defaults so that recalibration never touches the algorithm code.

use crate::error::{Error, Result};
use crate::float_trait::SpeckleFloat;

// =============================================================================
// Constants
// =============================================================================

/// Default side length of the square statistics window
const DEFAULT_WINDOW_SIZE: usize = 7;

/// Default threshold levels for the two-step model, as fractions of full scale
const DEFAULT_TWO_STEP_LEVELS: [f64; 3] = [1.0, 0.8, 0.6];

/// Numerator slope of the one-step rational correction
const DEFAULT_C1: f64 = -0.8;

/// Linear denominator coefficient of the one-step rational correction
const DEFAULT_Q1: f64 = -0.85;

/// Quadratic denominator coefficient of the one-step rational correction
const DEFAULT_Q2: f64 = 0.25;

/// Additive guard for saturation-ratio denominators
const DEFAULT_EPSILON: f64 = 1e-10;

/// Corrected contrast below this value is treated as diverged
const DEFAULT_FLOOR: f64 = 0.01;

/// Default maximum number of SOR sweeps in the inpainting fill
const DEFAULT_INPAINT_MAX_ITERATIONS: usize = 2000;

/// Default convergence tolerance (max update relative to value scale)
const DEFAULT_INPAINT_TOLERANCE: f64 = 1e-6;

/// Default over-relaxation factor
const DEFAULT_INPAINT_RELAXATION: f64 = 1.5;

// =============================================================================
// Types
// =============================================================================

/// Extrapolation model used to remove the saturation bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionModel {
    /// Single sweep at full scale followed by the rational correction.
    OneStep,
    /// Squared-contrast extrapolation over two or three threshold levels,
    /// nested when a third level is configured.
    #[default]
    TwoStep,
}

impl CorrectionModel {
    /// Map an iteration count (1 or 2) to a model.
    pub fn from_iterations(iterations: usize) -> Result<Self> {
        match iterations {
            1 => Ok(CorrectionModel::OneStep),
            2 => Ok(CorrectionModel::TwoStep),
            n => Err(Error::InvalidIterations(n)),
        }
    }

    /// Iteration count this model corresponds to.
    pub fn iterations(self) -> usize {
        match self {
            CorrectionModel::OneStep => 1,
            CorrectionModel::TwoStep => 2,
        }
    }
}

/// Extension of the frame beyond its border for windowed statistics.
///
/// The same mode is used for mean, standard deviation and saturation ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderMode {
    /// Mirror the frame about its edge (`b a | a b c d | d c`). The mirror
    /// repeats with period 2n, so windows wider than the frame stay on it.
    #[default]
    Reflect,
    /// Pad with zeros and normalize by the full window area.
    Zero,
    /// Clip the window to the frame and normalize by the clipped area.
    Truncate,
}

/// Empirical calibration of the correction.
#[derive(Debug, Clone)]
pub struct Calibration<F: SpeckleFloat> {
    /// Threshold levels of the two-step model, strictly decreasing in (0, 1].
    /// Two entries give a single extrapolation, three a nested one.
    /// Default: [1.0, 0.8, 0.6]
    pub two_step_levels: Vec<F>,
    /// Rational correction numerator slope. Default: -0.8
    pub c1: F,
    /// Rational correction linear denominator term. Default: -0.85
    pub q1: F,
    /// Rational correction quadratic denominator term. Default: 0.25
    pub q2: F,
    /// Additive denominator guard. Default: 1e-10
    pub epsilon: F,
    /// Plausibility floor for corrected contrast. Default: 0.01
    pub floor: F,
}

impl<F: SpeckleFloat> Default for Calibration<F> {
    fn default() -> Self {
        Self {
            two_step_levels: DEFAULT_TWO_STEP_LEVELS
                .iter()
                .map(|&t| F::from_f64_c(t))
                .collect(),
            c1: F::from_f64_c(DEFAULT_C1),
            q1: F::from_f64_c(DEFAULT_Q1),
            q2: F::from_f64_c(DEFAULT_Q2),
            epsilon: F::from_f64_c(DEFAULT_EPSILON),
            floor: F::from_f64_c(DEFAULT_FLOOR),
        }
    }
}

impl<F: SpeckleFloat> Calibration<F> {
    /// Threshold levels swept for the given model. The first entry is the
    /// primary level whose maps are reported.
    pub fn levels(&self, model: CorrectionModel) -> Vec<F> {
        match model {
            CorrectionModel::OneStep => vec![F::one()],
            CorrectionModel::TwoStep => self.two_step_levels.clone(),
        }
    }

    /// Validate the calibration parameters.
    pub fn validate(&self) -> Result<()> {
        let n = self.two_step_levels.len();
        if !(2..=3).contains(&n) {
            return Err(Error::InvalidConfig(format!(
                "two_step_levels must have 2 or 3 entries, got {}",
                n
            )));
        }
        for &level in &self.two_step_levels {
            if !(level > F::zero() && level <= F::one()) {
                return Err(Error::InvalidConfig(format!(
                    "threshold level {:?} outside (0, 1]",
                    level
                )));
            }
        }
        if self
            .two_step_levels
            .windows(2)
            .any(|pair| pair[1] >= pair[0])
        {
            return Err(Error::InvalidConfig(
                "two_step_levels must be strictly decreasing".to_string(),
            ));
        }
        for (name, value) in [("c1", self.c1), ("q1", self.q1), ("q2", self.q2)] {
            if !value.is_finite() {
                return Err(Error::InvalidConfig(format!("{} must be finite", name)));
            }
        }
        if !(self.epsilon > F::zero()) || !self.epsilon.is_finite() {
            return Err(Error::InvalidConfig("epsilon must be > 0".to_string()));
        }
        if !(self.floor > F::zero()) || !self.floor.is_finite() {
            return Err(Error::InvalidConfig("floor must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Parameters of the diffusion fill used to repair invalid pixels.
#[derive(Debug, Clone)]
pub struct InpaintConfig<F: SpeckleFloat> {
    /// Maximum number of Gauss-Seidel/SOR sweeps. Default: 2000
    pub max_iterations: usize,
    /// Stop when the largest update falls below this fraction of the
    /// boundary value scale. Default: 1e-6
    pub tolerance: F,
    /// Over-relaxation factor in [1, 2). Default: 1.5
    pub relaxation: F,
}

impl<F: SpeckleFloat> Default for InpaintConfig<F> {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_INPAINT_MAX_ITERATIONS,
            tolerance: F::from_f64_c(DEFAULT_INPAINT_TOLERANCE),
            relaxation: F::from_f64_c(DEFAULT_INPAINT_RELAXATION),
        }
    }
}

impl<F: SpeckleFloat> InpaintConfig<F> {
    /// Validate the fill parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > F::zero()) {
            return Err(Error::InvalidConfig("tolerance must be > 0".to_string()));
        }
        if !(self.relaxation >= F::one() && self.relaxation < F::from_f64_c(2.0)) {
            return Err(Error::InvalidConfig(
                "relaxation must be in [1, 2)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for saturation-corrected contrast estimation.
///
/// Use `Default::default()` for standard settings.
#[derive(Debug, Clone)]
pub struct CorrectionConfig<F: SpeckleFloat> {
    /// Side length of the square statistics window. Default: 7
    pub window_size: usize,
    /// Saturation ceiling in sample units. Default: None (sample full scale)
    pub saturation_level: Option<F>,
    /// Extrapolation model. Default: TwoStep
    pub model: CorrectionModel,
    /// Border extension for windowed statistics. Default: Reflect
    pub border: BorderMode,
    /// Empirical calibration constants.
    pub calibration: Calibration<F>,
    /// Inpainting parameters.
    pub inpaint: InpaintConfig<F>,
}

impl<F: SpeckleFloat> Default for CorrectionConfig<F> {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            saturation_level: None,
            model: CorrectionModel::default(),
            border: BorderMode::default(),
            calibration: Calibration::default(),
            inpaint: InpaintConfig::default(),
        }
    }
}

impl<F: SpeckleFloat> CorrectionConfig<F> {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for a window size and iteration count (1 or 2).
    pub fn with_iterations(window_size: usize, iterations: usize) -> Result<Self> {
        Ok(Self {
            window_size,
            model: CorrectionModel::from_iterations(iterations)?,
            ..Self::default()
        })
    }

    /// Saturation ceiling for frames whose sample type saturates at
    /// `full_scale`.
    pub fn ceiling(&self, full_scale: f64) -> f64 {
        self.saturation_level
            .map(|level| level.as_f64())
            .unwrap_or(full_scale)
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidWindow(self.window_size));
        }
        if let Some(level) = self.saturation_level {
            if !(level > F::zero()) || !level.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "saturation_level must be finite and > 0, got {:?}",
                    level
                )));
            }
        }
        self.calibration.validate()?;
        self.inpaint.validate()
    }
}
