//! Diffusion fill of masked pixels.
//!
//! Pixels flagged invalid are replaced by the solution of Laplace's equation
//! with the valid pixels as fixed (Dirichlet) boundary values. Only in-frame
//! 4-neighbors take part in the stencil, which amounts to a zero-flux
//! condition at the image border.
//!
//! The fill starts from an onion-peel guess (each hole pixel takes the mean
//! of its already-known neighbors, layer by layer from the hole boundary
//! inward) and then runs Gauss-Seidel sweeps with over-relaxation over the
//! hole pixels only.

use std::collections::VecDeque;

use ndarray::{Array2, ArrayView2};

use crate::config::InpaintConfig;
use crate::error::{Error, Result};
use crate::float_trait::SpeckleFloat;

/// Result of [`inpaint_masked`].
#[derive(Debug, Clone)]
pub struct FillOutcome<F: SpeckleFloat> {
    /// Input values with every invalid pixel replaced.
    pub values: Array2<F>,
    /// Number of relaxation sweeps performed.
    pub iterations: usize,
    /// Number of pixels that were filled.
    pub filled: usize,
    /// Whether the largest update fell below the tolerance.
    pub converged: bool,
}

/// In-frame 4-neighbors of `(r, c)`.
#[inline]
fn neighbors(r: usize, c: usize, rows: usize, cols: usize) -> impl Iterator<Item = (usize, usize)> {
    let up = r.checked_sub(1).map(|rr| (rr, c));
    let down = (r + 1 < rows).then_some((r + 1, c));
    let left = c.checked_sub(1).map(|cc| (r, cc));
    let right = (c + 1 < cols).then_some((r, c + 1));
    [up, down, left, right].into_iter().flatten()
}

/// Initial guess: propagate neighbor means inward from the hole boundary.
fn onion_peel<F: SpeckleFloat>(values: &mut Array2<F>, known: &mut Array2<bool>, holes: &[(usize, usize)]) {
    let (rows, cols) = values.dim();
    let mut queued = known.clone();
    let mut queue = VecDeque::new();

    for &(r, c) in holes {
        if neighbors(r, c, rows, cols).any(|n| known[n]) {
            queued[[r, c]] = true;
            queue.push_back((r, c));
        }
    }

    while let Some((r, c)) = queue.pop_front() {
        let mut sum = F::zero();
        let mut count = 0usize;
        for n in neighbors(r, c, rows, cols) {
            if known[n] {
                sum += values[n];
                count += 1;
            }
        }
        if count > 0 {
            values[[r, c]] = sum / F::usize_as(count);
        }
        known[[r, c]] = true;

        for n in neighbors(r, c, rows, cols) {
            if !queued[n] {
                queued[n] = true;
                queue.push_back(n);
            }
        }
    }
}

/// Fill the pixels flagged in `invalid` from the surrounding valid pixels.
///
/// Valid pixels are returned unchanged and must hold finite values. The
/// stopping tolerance is relative to the largest valid magnitude. When no
/// valid pixel exists there is nothing to diffuse from; the holes are set to
/// zero and a warning is logged.
pub fn inpaint_masked<F: SpeckleFloat>(
    values: ArrayView2<F>,
    invalid: ArrayView2<bool>,
    config: &InpaintConfig<F>,
) -> Result<FillOutcome<F>> {
    if values.dim() != invalid.dim() {
        return Err(Error::DimensionMismatch {
            index: 0,
            expected: values.dim(),
            actual: invalid.dim(),
        });
    }
    config.validate()?;

    let (rows, cols) = values.dim();
    let mut out = values.to_owned();
    let mut known = invalid.mapv(|bad| !bad);

    let holes: Vec<(usize, usize)> = invalid
        .indexed_iter()
        .filter_map(|(idx, &bad)| bad.then_some(idx))
        .collect();

    if holes.is_empty() {
        return Ok(FillOutcome {
            values: out,
            iterations: 0,
            filled: 0,
            converged: true,
        });
    }

    if holes.len() == rows * cols {
        log::warn!(
            "inpaint: all {} pixels are invalid, filling with zero",
            holes.len()
        );
        out.fill(F::zero());
        return Ok(FillOutcome {
            values: out,
            iterations: 0,
            filled: holes.len(),
            converged: false,
        });
    }

    let scale = out
        .iter()
        .zip(known.iter())
        .filter(|&(_, &k)| k)
        .fold(F::zero(), |acc, (&v, _)| acc.max(v.abs()));
    let threshold = config.tolerance * scale;

    onion_peel(&mut out, &mut known, &holes);

    let mut iterations = 0;
    let mut converged = false;
    for sweep in 1..=config.max_iterations {
        let mut max_update = F::zero();
        for &(r, c) in &holes {
            let mut sum = F::zero();
            let mut count = 0usize;
            for n in neighbors(r, c, rows, cols) {
                sum += out[n];
                count += 1;
            }
            if count == 0 {
                continue;
            }
            let target = sum / F::usize_as(count);
            let delta = (target - out[[r, c]]) * config.relaxation;
            out[[r, c]] += delta;
            max_update = max_update.max(delta.abs());
        }
        iterations = sweep;
        if max_update <= threshold {
            converged = true;
            break;
        }
    }

    log::debug!(
        "inpaint: filled {} pixels in {} sweeps (converged: {})",
        holes.len(),
        iterations,
        converged
    );

    Ok(FillOutcome {
        values: out,
        iterations,
        filled: holes.len(),
        converged,
    })
}
