//! Conformalized Quantile Regression
//!
//! A quantile model predicts the band `[q_lo(x), q_hi(x)]` at `alpha / 2` and
//! `1 - alpha / 2`. On calibration data the conformity score
//! `max(q_lo(x) - y, y - q_hi(x))` measures how far outside the band an
//! outcome lands; its finite-sample `1 - alpha` quantile `Q` widens (or, when
//! negative, narrows) the band. Widths follow the quantile model, so
//! heteroscedastic data gets heteroscedastic intervals.
use crate::config::ConformalConfig;
use crate::conformal::{
    normalize_alphas, predict_rows, resolve_alpha, CalibrationSummary, IntervalResult, IntervalStrategy, Strategy,
};
use crate::constants::{LEVEL_TOLERANCE, MEDIAN_LEVEL};
use crate::data::{Dataset, Matrix};
use crate::errors::ConformalError;
use crate::model::{QuantileFit, QuantileRegressor};
use crate::quantile::{check_attainable, conformal_quantile};
use crate::utils::{alpha_key, float_cmp};
use hashbrown::HashMap;
use log::{info, warn};
use rayon::prelude::*;
use std::sync::Arc;

/// Calibrator for conformalized quantile regression.
#[derive(Clone, Debug, Default)]
pub struct CqrConformal {
    pub config: ConformalConfig,
}

/// Quantile model plus one correction `Q` per calibrated alpha.
pub struct CqrAdjustment {
    model: Arc<dyn QuantileRegressor>,
    alphas: Vec<f64>,
    corrections: HashMap<String, f64>,
    n_calibration: usize,
    config: ConformalConfig,
}

fn band_levels(alpha: f64) -> (f64, f64) {
    (alpha / 2.0, 1.0 - alpha / 2.0)
}

/// Conformity score of one outcome against a predicted band.
#[inline]
pub fn conformity_score(q_lo: f64, q_hi: f64, y: f64) -> f64 {
    f64::max(q_lo - y, y - q_hi)
}

/// Quantile levels the model must be fit for to serve `alphas`.
fn required_levels(alphas: &[f64], with_median: bool) -> Vec<f64> {
    let mut levels: Vec<f64> = alphas
        .iter()
        .flat_map(|a| {
            let (lo, hi) = band_levels(*a);
            [lo, hi]
        })
        .collect();
    if with_median {
        levels.push(MEDIAN_LEVEL);
    }
    levels.sort_by(float_cmp);
    levels.dedup_by(|a, b| (*a - *b).abs() <= LEVEL_TOLERANCE);
    levels
}

impl CqrConformal {
    pub fn new(config: ConformalConfig) -> Self {
        CqrConformal { config }
    }

    /// Fit the quantile model on `train_data` and calibrate every alpha on `cal_data`.
    ///
    /// * `quantile_fit_fn` - Quantile model fitting capability.
    /// * `train_data` - Records the quantile model is fit on.
    /// * `cal_data` - Held-out calibration records.
    /// * `alphas` - Miscoverage levels in `(0, 1)`.
    pub fn calibrate<F: QuantileFit>(
        &self,
        quantile_fit_fn: &F,
        train_data: &Dataset,
        cal_data: &Dataset,
        alphas: &[f64],
    ) -> Result<CqrAdjustment, ConformalError> {
        let alphas = normalize_alphas(alphas)?;
        if cal_data.is_empty() {
            return Err(ConformalError::invalid_argument(
                "cal_data",
                "at least one calibration record",
                "empty dataset",
            ));
        }
        let n = cal_data.rows();
        // Fail on unattainable levels before paying for the fit.
        for alpha in &alphas {
            check_attainable(n, 1.0 - alpha)?;
        }

        let levels = required_levels(&alphas, self.config.cqr_median);
        let model: Arc<dyn QuantileRegressor> = Arc::new(quantile_fit_fn.fit(train_data, &levels)?);

        let m = cal_data.matrix();
        let predict = |i: usize| model.predict_quantiles(&m.get_row(i), &levels);
        let cal_preds: Vec<Vec<f64>> = if self.config.parallel {
            (0..n).into_par_iter().map(predict).collect::<Result<_, _>>()?
        } else {
            (0..n).map(predict).collect::<Result<_, _>>()?
        };
        let position = |level: f64| levels.iter().position(|l| (l - level).abs() <= LEVEL_TOLERANCE);

        let mut corrections = HashMap::with_capacity(alphas.len());
        for alpha in &alphas {
            let (lo_level, hi_level) = band_levels(*alpha);
            // Both levels were requested from the fit above.
            let (lo, hi) = match (position(lo_level), position(hi_level)) {
                (Some(lo), Some(hi)) => (lo, hi),
                _ => {
                    return Err(ConformalError::InvalidConfiguration(format!(
                        "quantile levels for alpha {} are missing",
                        alpha
                    )))
                }
            };
            let mut crossings = 0;
            let scores: Vec<f64> = cal_preds
                .iter()
                .zip(cal_data.y())
                .map(|(q, y)| {
                    if q[lo] > q[hi] {
                        crossings += 1;
                    }
                    conformity_score(q[lo], q[hi], *y)
                })
                .collect();
            if crossings > 0 {
                warn!(
                    "Quantile model crossed on {} of {} calibration records at alpha {}.",
                    crossings, n, alpha
                );
            }
            let correction = conformal_quantile(&scores, 1.0 - alpha, self.config.quantile_method)?;
            info!(
                "Calibrated CQR on {} records at alpha {}, correction {}.",
                n, alpha, correction
            );
            corrections.insert(alpha_key(*alpha), correction);
        }

        Ok(CqrAdjustment {
            model,
            alphas,
            corrections,
            n_calibration: n,
            config: self.config.clone(),
        })
    }
}

/// Calibrate CQR at a single alpha with the default configuration.
pub fn calibrate_cqr<F: QuantileFit>(
    quantile_fit_fn: &F,
    train_data: &Dataset,
    cal_data: &Dataset,
    alpha: f64,
) -> Result<CqrAdjustment, ConformalError> {
    CqrConformal::default().calibrate(quantile_fit_fn, train_data, cal_data, &[alpha])
}

/// Calibrate CQR at several alphas with one quantile model fit.
pub fn calibrate_cqr_levels<F: QuantileFit>(
    quantile_fit_fn: &F,
    train_data: &Dataset,
    cal_data: &Dataset,
    alphas: &[f64],
) -> Result<CqrAdjustment, ConformalError> {
    CqrConformal::default().calibrate(quantile_fit_fn, train_data, cal_data, alphas)
}

impl CqrAdjustment {
    /// Correction `Q` of a calibrated alpha.
    pub fn correction(&self, alpha: f64) -> Option<f64> {
        self.corrections.get(&alpha_key(alpha)).copied()
    }

    /// Indices of the rows in `data` where the model's bounds cross at `alpha`.
    pub fn crossing_rows(&self, data: &Matrix<f64>, alpha: f64) -> Result<Vec<usize>, ConformalError> {
        let (lo_level, hi_level) = band_levels(alpha);
        let mut rows = Vec::new();
        for i in 0..data.rows {
            let q = self.model.predict_quantiles(&data.get_row(i), &[lo_level, hi_level])?;
            if q[0] > q[1] {
                rows.push(i);
            }
        }
        Ok(rows)
    }
}

impl IntervalStrategy for CqrAdjustment {
    fn strategy(&self) -> Strategy {
        Strategy::Cqr
    }

    fn alphas(&self) -> Vec<f64> {
        self.alphas.clone()
    }

    fn config(&self) -> &ConformalConfig {
        &self.config
    }

    fn predict_row(&self, row: &[f64], alpha: f64) -> Result<IntervalResult, ConformalError> {
        let correction = self
            .correction(alpha)
            .ok_or_else(|| ConformalError::LevelMismatch(1.0 - alpha, self.alphas.iter().map(|a| 1.0 - a).collect()))?;
        let (lo_level, hi_level) = band_levels(alpha);
        let q = if self.config.cqr_median {
            self.model.predict_quantiles(row, &[lo_level, hi_level, MEDIAN_LEVEL])?
        } else {
            self.model.predict_quantiles(row, &[lo_level, hi_level])?
        };
        let mut lower = q[0] - correction;
        let mut upper = q[1] + correction;
        let crossing = q[0] > q[1] || lower > upper;
        if lower > upper {
            std::mem::swap(&mut lower, &mut upper);
        }
        let point = if self.config.cqr_median {
            q[2].clamp(lower, upper)
        } else {
            (lower + upper) / 2.0
        };
        Ok(IntervalResult {
            point_prediction: point,
            lower_bound: lower,
            upper_bound: upper,
            crossing,
        })
    }

    fn predict_interval(&self, data: &Matrix<f64>, level: f64) -> Result<Vec<IntervalResult>, ConformalError> {
        let alpha = resolve_alpha(&self.alphas, level)?;
        let intervals = predict_rows(data, self.config.parallel, |row| self.predict_row(row, alpha))?;
        let crossings = intervals.iter().filter(|iv| iv.crossing).count();
        if crossings > 0 {
            warn!(
                "Quantile bounds crossed on {} of {} rows and were reordered.",
                crossings,
                intervals.len()
            );
        }
        Ok(intervals)
    }

    fn summary(&self) -> CalibrationSummary {
        CalibrationSummary {
            strategy: Strategy::Cqr,
            alphas: self.alphas.clone(),
            n_calibration: self.n_calibration,
            adjustments: self.corrections.iter().map(|(k, v)| (k.clone(), vec![*v])).collect(),
            coverage_verified: true,
            quantile_method: self.config.quantile_method,
        }
    }
}
