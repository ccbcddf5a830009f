use crate::constants::{IRLS_ITERATION_LIMIT, IRLS_RESIDUAL_FLOOR, IRLS_TOLERANCE};
use crate::data::Dataset;
use crate::errors::ConformalError;
use crate::metrics::regression::pinball_loss;
use crate::model::QuantileRegressor;
use crate::models::linear::{least_squares, linear_predictor};
use crate::utils::{alpha_key, fmt_vec_output, validate_float_parameter};
use hashbrown::HashMap;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Linear quantile regression, one coefficient vector per level.
///
/// Each level minimizes the pinball loss through iteratively reweighted
/// least squares, starting from the ordinary least squares solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearQuantileRegression {
    levels: Vec<f64>,
    coefficients: HashMap<String, Vec<f64>>,
}

fn fit_level(data: &Dataset, tau: f64) -> Result<Vec<f64>, ConformalError> {
    let m = data.matrix();
    let y = data.y();
    let mut beta = least_squares(data, None)?;
    for iteration in 0..IRLS_ITERATION_LIMIT {
        let weights: Vec<f64> = (0..data.rows())
            .map(|i| {
                let r = y[i] - linear_predictor(&beta, &m.get_row(i))?;
                let side = if r >= 0.0 { tau } else { 1.0 - tau };
                Ok(side / r.abs().max(IRLS_RESIDUAL_FLOOR))
            })
            .collect::<Result<_, ConformalError>>()?;
        let next = least_squares(data, Some(&weights))?;
        let change = beta
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        beta = next;
        if change < IRLS_TOLERANCE {
            debug!(
                "Quantile {} converged after {} iterations, coefficients [{}].",
                tau,
                iteration + 1,
                fmt_vec_output(&beta)
            );
            break;
        }
    }
    Ok(beta)
}

impl LinearQuantileRegression {
    /// Fit one linear model per quantile level.
    ///
    /// * `data` - Training records.
    /// * `levels` - Quantile levels in `(0, 1)`.
    pub fn fit(data: &Dataset, levels: &[f64]) -> Result<Self, ConformalError> {
        if levels.is_empty() {
            return Err(ConformalError::invalid_argument("levels", "at least one level", "none"));
        }
        for level in levels {
            validate_float_parameter(*level, f64::MIN_POSITIVE, 1.0 - f64::EPSILON, "levels")?;
        }
        let fitted: Vec<Vec<f64>> = levels
            .par_iter()
            .map(|tau| fit_level(data, *tau))
            .collect::<Result<_, ConformalError>>()?;
        let coefficients = levels.iter().map(|l| alpha_key(*l)).zip(fitted).collect();
        Ok(LinearQuantileRegression {
            levels: levels.to_vec(),
            coefficients,
        })
    }

    /// Coefficients of one level, intercept first.
    pub fn coefficients(&self, level: f64) -> Option<&[f64]> {
        self.coefficients.get(&alpha_key(level)).map(|c| c.as_slice())
    }

    /// Mean pinball loss of the `level` quantile predictions on `data`.
    pub fn level_loss(&self, data: &Dataset, level: f64) -> Result<f64, ConformalError> {
        let m = data.matrix();
        let yhat = (0..data.rows())
            .map(|i| Ok(self.predict_quantiles(&m.get_row(i), &[level])?[0]))
            .collect::<Result<Vec<f64>, ConformalError>>()?;
        pinball_loss(data.y(), &yhat, level)
    }
}

impl QuantileRegressor for LinearQuantileRegression {
    fn levels(&self) -> Vec<f64> {
        self.levels.clone()
    }

    fn predict_quantiles(&self, row: &[f64], levels: &[f64]) -> Result<Vec<f64>, ConformalError> {
        levels
            .iter()
            .map(|level| {
                let beta = self.coefficients(*level).ok_or_else(|| {
                    ConformalError::invalid_argument("level", "a level the model was fit for", level)
                })?;
                linear_predictor(beta, row)
            })
            .collect()
    }
}
