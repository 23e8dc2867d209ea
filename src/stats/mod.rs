//! Numerical primitives for the scoring and calibration pipeline
//!
//! Everything here works on plain `f64` slices:
//! - softmax normalisation of log-weights (with temperature)
//! - Jensen-Shannon distance between discrete distributions
//! - Nelder-Mead minimisation (used to fit temperatures)
//! - permutation p-values and Benjamini-Hochberg correction

mod divergence;
mod optimize;
mod permutation;

pub use divergence::jensen_shannon;
pub use optimize::{nelder_mead, NelderMeadOptions, OptimizeResult};
pub use permutation::{benjamini_hochberg, null_distances, permutation_pvalue};

use thiserror::Error;

/// Errors raised by the numerical routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Distribution lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Distribution has no mass (sum is zero or empty)")]
    EmptyDistribution,

    #[error("Distribution contains a negative or non-finite entry: {0}")]
    InvalidEntry(f64),
}

pub type StatsResult<T> = Result<T, StatsError>;

/// Softmax of `weights / temperature`.
///
/// The maximum is subtracted before exponentiating so large log-weights
/// (e.g. summed token log-probabilities of -300) don't underflow to 0/0.
pub fn softmax(weights: &[f64], temperature: f64) -> Vec<f64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let scaled: Vec<f64> = weights.iter().map(|w| w / temperature).collect();
    let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scaled.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Turn response counts into a probability vector.
pub fn normalize_counts(counts: &[f64]) -> StatsResult<Vec<f64>> {
    if let Some(bad) = counts.iter().find(|c| !c.is_finite() || **c < 0.0) {
        return Err(StatsError::InvalidEntry(*bad));
    }
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return Err(StatsError::EmptyDistribution);
    }
    Ok(counts.iter().map(|c| c / total).collect())
}

/// Index of the largest value (first one on ties).
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
