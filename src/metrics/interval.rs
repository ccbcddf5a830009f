use crate::config::ConformalIO;
use crate::conformal::IntervalResult;
use crate::errors::ConformalError;
use crate::utils::validate_alpha;
use serde::{Deserialize, Serialize};

fn check_lengths(intervals: &[IntervalResult], y: &[f64]) -> Result<(), ConformalError> {
    if intervals.len() != y.len() {
        return Err(ConformalError::ShapeMismatch("y".to_string(), intervals.len(), y.len()));
    }
    if intervals.is_empty() {
        return Err(ConformalError::invalid_argument("intervals", "at least one interval", "none"));
    }
    Ok(())
}

/// Share of outcomes inside their closed interval.
pub fn empirical_coverage(intervals: &[IntervalResult], y: &[f64]) -> Result<f64, ConformalError> {
    check_lengths(intervals, y)?;
    let covered = intervals.iter().zip(y).filter(|(iv, y_)| iv.covers(**y_)).count();
    Ok(covered as f64 / y.len() as f64)
}

pub fn mean_width(intervals: &[IntervalResult]) -> Result<f64, ConformalError> {
    if intervals.is_empty() {
        return Err(ConformalError::invalid_argument("intervals", "at least one interval", "none"));
    }
    Ok(intervals.iter().map(|iv| iv.width()).sum::<f64>() / intervals.len() as f64)
}

/// Population standard deviation of the widths. Zero for constant-width strategies.
pub fn width_std(intervals: &[IntervalResult]) -> Result<f64, ConformalError> {
    let mean = mean_width(intervals)?;
    let var = intervals.iter().map(|iv| (iv.width() - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
    Ok(var.sqrt())
}

/// Mean interval (Winkler) score at miscoverage `alpha`.
///
/// Each row scores its width plus `2 / alpha` times the distance by which
/// the outcome misses the interval. Lower is better.
pub fn interval_score(intervals: &[IntervalResult], y: &[f64], alpha: f64) -> Result<f64, ConformalError> {
    check_lengths(intervals, y)?;
    validate_alpha(alpha)?;
    let penalty = 2.0 / alpha;
    let total = intervals
        .iter()
        .zip(y)
        .map(|(iv, y_)| {
            let below = (iv.lower_bound - y_).max(0.0);
            let above = (y_ - iv.upper_bound).max(0.0);
            iv.width() + penalty * (below + above)
        })
        .sum::<f64>();
    Ok(total / y.len() as f64)
}

/// Evaluation of a batch of intervals against observed outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalMetrics {
    pub n: usize,
    pub coverage: f64,
    pub mean_width: f64,
    pub width_std: f64,
    pub interval_score: f64,
    /// Rows whose quantile bounds crossed.
    pub crossings: usize,
}

impl IntervalMetrics {
    /// Compute every metric for intervals produced at miscoverage `alpha`.
    pub fn evaluate(intervals: &[IntervalResult], y: &[f64], alpha: f64) -> Result<Self, ConformalError> {
        Ok(IntervalMetrics {
            n: y.len(),
            coverage: empirical_coverage(intervals, y)?,
            mean_width: mean_width(intervals)?,
            width_std: width_std(intervals)?,
            interval_score: interval_score(intervals, y, alpha)?,
            crossings: intervals.iter().filter(|iv| iv.crossing).count(),
        })
    }
}

impl ConformalIO for IntervalMetrics {}
