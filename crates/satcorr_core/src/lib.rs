//! Saturation-Corrected Speckle Contrast Library
//!
//! Pure Rust estimation of local laser-speckle contrast from frame sequences
//! recorded with a partially saturated sensor. Contrast and saturated
//! fraction are swept over synthetic ceilings, extrapolated to zero
//! saturation, bias-corrected and repaired so that the returned map is finite
//! and non-negative.

pub mod config;
pub mod correction;
pub mod error;
pub mod extrapolation;
pub mod float_trait;
pub mod inpaint;
pub mod orchestration;
pub mod saturation;
pub mod sweep;
pub mod window;

// Re-export commonly used types at the crate root
pub use config::{BorderMode, Calibration, CorrectionConfig, CorrectionModel, InpaintConfig};
pub use correction::RepairStats;
pub use error::{Error, Result};
pub use float_trait::{Sample, SpeckleFloat};
pub use inpaint::{inpaint_masked, FillOutcome};
pub use orchestration::{
    correct_from_sweep, correct_saturated_contrast, correct_saturated_contrast_stack,
    new_sweep_accumulator, ContrastMaps,
};
pub use sweep::{SweepAccumulator, SweepMaps};
pub use window::{local_contrast, window_statistics, WindowStats};
