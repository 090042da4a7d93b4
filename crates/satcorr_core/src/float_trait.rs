//! Float trait abstraction for f32/f64 support.
//!
//! This module provides a unified trait for the floating-point maps produced
//! by the correction, enabling the library to work with both f32 and f64
//! precision, plus a trait for the integer and float sample types frames may
//! be stored in.

use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::Debug;
use std::iter::Sum;

/// Trait alias for floating point types supported by the contrast maps.
///
/// This trait combines all the bounds needed for map operations:
/// - Basic float operations (Float, NumAssign)
/// - Conversion from primitive types (FromPrimitive)
/// - Iteration support (Sum)
/// - Debug printing
pub trait SpeckleFloat:
    Float + FromPrimitive + NumAssign + Sum + Debug + Send + Sync + 'static
{
    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize constant.
    fn usize_as(val: usize) -> Self;

    /// Widen to f64 for accumulation.
    fn as_f64(self) -> f64;
}

impl SpeckleFloat for f32 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl SpeckleFloat for f64 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

/// Pixel sample type of an input frame.
///
/// Samples are widened to f64 before any windowed reduction. `FULL_SCALE` is
/// the largest representable intensity and serves as the default saturation
/// ceiling.
pub trait Sample: Copy + Send + Sync + 'static {
    /// Maximum representable intensity for this sample type.
    const FULL_SCALE: f64;

    /// Widen the sample to f64.
    fn widen(self) -> f64;
}

impl Sample for u8 {
    const FULL_SCALE: f64 = u8::MAX as f64;

    #[inline]
    fn widen(self) -> f64 {
        self as f64
    }
}

impl Sample for u16 {
    const FULL_SCALE: f64 = u16::MAX as f64;

    #[inline]
    fn widen(self) -> f64 {
        self as f64
    }
}

impl Sample for f32 {
    const FULL_SCALE: f64 = 1.0;

    #[inline]
    fn widen(self) -> f64 {
        self as f64
    }
}

impl Sample for f64 {
    const FULL_SCALE: f64 = 1.0;

    #[inline]
    fn widen(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_trait_impl() {
        let val: f32 = SpeckleFloat::from_f64_c(std::f64::consts::PI);
        assert!((val - std::f32::consts::PI).abs() < 1e-5);

        let usize_val: f32 = SpeckleFloat::usize_as(42);
        assert_eq!(usize_val, 42.0f32);

        assert!((SpeckleFloat::as_f64(0.25f32) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_f64_trait_impl() {
        let val: f64 = SpeckleFloat::from_f64_c(std::f64::consts::PI);
        assert!((val - std::f64::consts::PI).abs() < 1e-14);

        let usize_val: f64 = SpeckleFloat::usize_as(42);
        assert_eq!(usize_val, 42.0f64);
    }

    #[test]
    fn test_full_scale_per_sample_type() {
        assert_eq!(<u8 as Sample>::FULL_SCALE, 255.0);
        assert_eq!(<u16 as Sample>::FULL_SCALE, 65535.0);
        assert_eq!(<f32 as Sample>::FULL_SCALE, 1.0);
        assert_eq!(<f64 as Sample>::FULL_SCALE, 1.0);
    }

    #[test]
    fn test_widen_is_lossless_for_integers() {
        assert_eq!(200u8.widen(), 200.0);
        assert_eq!(65535u16.widen(), 65535.0);
        assert!((0.5f32.widen() - 0.5).abs() < 1e-12);
    }
}
