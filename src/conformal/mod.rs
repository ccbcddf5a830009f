//! Conformal Prediction
//!
//! Distribution-free prediction intervals around an opaque regression model.
//! Three strategies share one output contract:
//!
//! * `split`: split conformal, fixed-width intervals from one calibration set.
//! * `cv_plus`: CV+, fold models and out-of-fold residuals, fixed-width in spirit but uses all data.
//! * `cqr`: conformalized quantile regression, variable-width intervals.
//! * `predictor`: the [`Adjustment`] dispatch and [`ConformalPredictor`] façade.

pub mod cqr;
pub mod cv_plus;
pub mod predictor;
pub mod split;
#[cfg(test)]
mod tests;

pub use cqr::{calibrate_cqr, calibrate_cqr_levels, CqrAdjustment, CqrConformal};
pub use cv_plus::{calibrate_cv_plus, CvPlusAdjustment, CvPlusConformal};
pub use predictor::{predict_interval, Adjustment, ConformalPredictor};
pub use split::{calibrate_split, SplitAdjustment, SplitConformal};

use crate::config::{ConformalConfig, ConformalIO};
use crate::constants::LEVEL_TOLERANCE;
use crate::data::Matrix;
use crate::errors::ConformalError;
use crate::quantile::QuantileMethod;
use crate::utils::{float_cmp, validate_float_parameter};
use hashbrown::HashMap;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Interval produced for one input row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalResult {
    pub point_prediction: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// The raw bounds came out reversed and were reordered: a crossing
    /// quantile model for CQR, disagreeing fold models for CV+ at large alpha.
    pub crossing: bool,
}

impl IntervalResult {
    pub fn new(point_prediction: f64, lower_bound: f64, upper_bound: f64) -> Self {
        IntervalResult {
            point_prediction,
            lower_bound,
            upper_bound,
            crossing: false,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    /// Whether `y` falls inside the closed interval.
    pub fn covers(&self, y: f64) -> bool {
        y >= self.lower_bound && y <= self.upper_bound
    }
}

/// The interval algorithm an adjustment was calibrated with.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Strategy {
    Split,
    CvPlus,
    Cqr,
    Custom,
}

/// Serializable report of a calibration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CalibrationSummary {
    pub strategy: Strategy,
    /// Calibrated miscoverage levels, ascending.
    pub alphas: Vec<f64>,
    /// Number of residuals or scores the calibration was computed from.
    pub n_calibration: usize,
    /// Strategy specific values per alpha: `[q_low, q_high]` for split,
    /// `[lower_rank, upper_rank]` for CV+, `[Q]` for CQR.
    pub adjustments: HashMap<String, Vec<f64>>,
    /// False when the CV+ fold layout voids the coverage proof.
    pub coverage_verified: bool,
    pub quantile_method: QuantileMethod,
}

impl ConformalIO for CalibrationSummary {}

/// Common contract of every calibrated strategy.
pub trait IntervalStrategy: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Calibrated miscoverage levels, ascending.
    fn alphas(&self) -> Vec<f64>;

    fn config(&self) -> &ConformalConfig;

    /// Interval for one feature vector at a calibrated `alpha`.
    fn predict_row(&self, row: &[f64], alpha: f64) -> Result<IntervalResult, ConformalError>;

    fn summary(&self) -> CalibrationSummary;

    /// Intervals for every row of `data` at coverage `level`.
    ///
    /// Fails with [`ConformalError::LevelMismatch`] if `level` is above every calibrated level.
    fn predict_interval(&self, data: &Matrix<f64>, level: f64) -> Result<Vec<IntervalResult>, ConformalError> {
        let alpha = resolve_alpha(&self.alphas(), level)?;
        predict_rows(data, self.config().parallel, |row| self.predict_row(row, alpha))
    }
}

/// Pick the calibrated alpha that serves a request at coverage `level`.
///
/// An exact match is used as is. A lower requested level is served by the
/// closest calibrated level above it, which only widens the interval.
pub fn resolve_alpha(alphas: &[f64], level: f64) -> Result<f64, ConformalError> {
    validate_float_parameter(level, f64::MIN_POSITIVE, 1.0 - f64::EPSILON, "level")?;
    let requested = 1.0 - level;
    let chosen = alphas
        .iter()
        .copied()
        .filter(|a| *a <= requested + LEVEL_TOLERANCE)
        .max_by(float_cmp);
    match chosen {
        Some(alpha) => {
            if (alpha - requested).abs() > LEVEL_TOLERANCE {
                debug!(
                    "Level {} served by the calibration at level {}.",
                    level,
                    1.0 - alpha
                );
            }
            Ok(alpha)
        }
        None => Err(ConformalError::LevelMismatch(
            level,
            alphas.iter().map(|a| 1.0 - a).collect(),
        )),
    }
}

/// Map `f` over the rows of `data`, on the rayon pool when `parallel` is set.
pub(crate) fn predict_rows<F>(data: &Matrix<f64>, parallel: bool, f: F) -> Result<Vec<IntervalResult>, ConformalError>
where
    F: Fn(&[f64]) -> Result<IntervalResult, ConformalError> + Sync,
{
    data.validate()?;
    if parallel {
        (0..data.rows).into_par_iter().map(|i| f(&data.get_row(i))).collect()
    } else {
        (0..data.rows).map(|i| f(&data.get_row(i))).collect()
    }
}

/// Sort and dedupe alphas, rejecting any outside `(0, 1)`.
pub(crate) fn normalize_alphas(alphas: &[f64]) -> Result<Vec<f64>, ConformalError> {
    if alphas.is_empty() {
        return Err(ConformalError::invalid_argument("alpha", "at least one level", "none"));
    }
    for alpha in alphas {
        crate::utils::validate_alpha(*alpha)?;
    }
    let mut sorted = alphas.to_vec();
    sorted.sort_by(float_cmp);
    sorted.dedup_by(|a, b| (*a - *b).abs() <= LEVEL_TOLERANCE);
    Ok(sorted)
}
