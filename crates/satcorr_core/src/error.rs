//! Error types for saturation correction.
//!
//! Only configuration problems are errors. Numeric degeneracies inside the
//! correction (zero means, equal saturation ratios, NaN/Inf extrapolations)
//! are absorbed by the repair stage and never surface here.

use thiserror::Error;

/// Errors that can occur while configuring or running a correction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("No frames provided for correction")]
    EmptySequence,

    #[error("Frame {index} is empty (shape {rows}x{cols})")]
    EmptyFrame {
        index: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Window size must be > 0, got {0}")]
    InvalidWindow(usize),

    #[error("Dimension mismatch for frame {index}: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Iteration count must be 1 or 2, got {0}")]
    InvalidIterations(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for correction operations.
pub type Result<T> = std::result::Result<T, Error>;
