//! Quantile Estimator
//!
//! Empirical quantiles of a residual or nonconformity-score sample.
//!
//! Positions follow the "type 7" definition: for a sorted sample `x` of
//! length `n` and a level `p`, the virtual index is `h = (n - 1) * p`
//! (zero based). [`QuantileMethod`] decides how a fractional `h` is turned
//! into a value. `p = 0` and `p = 1` return the sample extremes.
//!
//! Conformal calibration evaluates the estimator at the finite-sample
//! corrected level `ceil((n + 1) * level) / n`. With that level every method
//! lands on or above the `ceil((n + 1) * level)`-th order statistic, which is
//! what the coverage guarantee needs.
use crate::constants::RANK_RELATIVE_TOLERANCE;
use crate::errors::ConformalError;
use crate::utils::{float_cmp, validate_float_parameter};
use serde::{Deserialize, Serialize};

/// Interpolation rule applied between neighbouring order statistics.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum QuantileMethod {
    /// Linear interpolation between the two neighbours (type 7).
    #[default]
    Linear,
    /// The lower neighbour.
    Lower,
    /// The higher neighbour.
    Higher,
    /// The closer neighbour, ties rounded away from zero.
    Nearest,
    /// Mean of both neighbours.
    Midpoint,
}

fn validate_sample(sample: &[f64]) -> Result<(), ConformalError> {
    if sample.is_empty() {
        return Err(ConformalError::invalid_argument("sample", "a nonempty sample", "empty sample"));
    }
    if sample.iter().any(|v| v.is_nan()) {
        return Err(ConformalError::invalid_argument("sample", "values without NaN", "NaN value"));
    }
    Ok(())
}

fn sorted_copy(sample: &[f64]) -> Vec<f64> {
    let mut sorted = sample.to_vec();
    sorted.sort_unstable_by(float_cmp);
    sorted
}

/// Quantile of an already sorted, nonempty sample. No validation is done.
pub fn quantile_sorted(sorted: &[f64], p: f64, method: QuantileMethod) -> f64 {
    let n = sorted.len();
    if p <= 0.0 {
        return sorted[0];
    }
    if p >= 1.0 {
        return sorted[n - 1];
    }
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (h.ceil() as usize).min(n - 1);
    match method {
        QuantileMethod::Linear => sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]),
        QuantileMethod::Lower => sorted[lo],
        QuantileMethod::Higher => sorted[hi],
        QuantileMethod::Nearest => sorted[(h.round() as usize).min(n - 1)],
        QuantileMethod::Midpoint => (sorted[lo] + sorted[hi]) / 2.0,
    }
}

/// Empirical `p`-quantile of `sample`.
///
/// * `sample` - Finite, nonempty values.
/// * `p` - Level in `[0, 1]`.
/// * `method` - Interpolation rule.
pub fn quantile(sample: &[f64], p: f64, method: QuantileMethod) -> Result<f64, ConformalError> {
    validate_sample(sample)?;
    validate_float_parameter(p, 0.0, 1.0, "p")?;
    Ok(quantile_sorted(&sorted_copy(sample), p, method))
}

/// Evaluate several levels with a single sort.
pub fn quantiles(sample: &[f64], ps: &[f64], method: QuantileMethod) -> Result<Vec<f64>, ConformalError> {
    validate_sample(sample)?;
    for p in ps {
        validate_float_parameter(*p, 0.0, 1.0, "p")?;
    }
    let sorted = sorted_copy(sample);
    Ok(ps.iter().map(|p| quantile_sorted(&sorted, *p, method)).collect())
}

/// Rank `ceil((n + 1) * level)` of the order statistic a conformal bound needs,
/// never below one.
pub fn conformal_rank(n: usize, level: f64) -> usize {
    let product = (n as f64 + 1.0) * level;
    // Absorb rounding noise only, like 20 * 0.95 landing one ulp above 19.
    let raw = product - product.abs() * RANK_RELATIVE_TOLERANCE;
    raw.ceil().max(1.0) as usize
}

/// Fail when the conformal rank for `level` exceeds the sample size.
pub fn check_attainable(n: usize, level: f64) -> Result<usize, ConformalError> {
    let rank = conformal_rank(n, level);
    if rank > n {
        return Err(ConformalError::DegenerateCalibration(rank, n, level));
    }
    Ok(rank)
}

/// The `k`-th smallest value of a sorted slice, `k` counted from one.
pub fn order_statistic(sorted: &[f64], k: usize) -> Result<f64, ConformalError> {
    if k == 0 || k > sorted.len() {
        return Err(ConformalError::invalid_argument(
            "k",
            &format!("rank between 1 and {}", sorted.len()),
            k,
        ));
    }
    Ok(sorted[k - 1])
}

/// Finite-sample corrected quantile used by the conformal strategies.
///
/// Returns `quantile(sample, ceil((n + 1) * level) / n)`, or
/// [`ConformalError::DegenerateCalibration`] if that rank is larger than `n`.
pub fn conformal_quantile(sample: &[f64], level: f64, method: QuantileMethod) -> Result<f64, ConformalError> {
    validate_sample(sample)?;
    validate_float_parameter(level, 0.0, 1.0, "level")?;
    let n = sample.len();
    let rank = check_attainable(n, level)?;
    let p = rank as f64 / n as f64;
    Ok(quantile_sorted(&sorted_copy(sample), p, method))
}
