//! Residual Store
//!
//! Out-of-sample residuals `outcome - predicted` of a fitted model, one per
//! calibration (or out-of-fold) record.
use crate::errors::ConformalError;
use crate::quantile::{conformal_quantile, QuantileMethod};
use serde::{Deserialize, Serialize};

/// Ordered residual sample. Never empty, every value finite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResidualSample {
    values: Vec<f64>,
}

impl ResidualSample {
    pub fn new(values: Vec<f64>) -> Result<Self, ConformalError> {
        if values.is_empty() {
            return Err(ConformalError::invalid_argument(
                "residuals",
                "at least one residual",
                "empty sample",
            ));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(ConformalError::invalid_argument("residuals", "finite residuals", v));
        }
        Ok(ResidualSample { values })
    }

    /// Residuals `y - yhat` for paired outcomes and predictions.
    pub fn from_predictions(y: &[f64], yhat: &[f64]) -> Result<Self, ConformalError> {
        if y.len() != yhat.len() {
            return Err(ConformalError::ShapeMismatch("predictions".to_string(), y.len(), yhat.len()));
        }
        ResidualSample::new(y.iter().zip(yhat).map(|(y_, yhat_)| y_ - yhat_).collect())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Absolute residuals.
    pub fn abs(&self) -> ResidualSample {
        ResidualSample {
            values: self.values.iter().map(|v| v.abs()).collect(),
        }
    }

    /// Conservative offsets `(q_low, q_high)` so that `yhat + [q_low, q_high]`
    /// covers a new outcome with probability at least `1 - alpha`.
    ///
    /// Each tail takes miscoverage `alpha / 2` at the finite-sample corrected rank.
    pub fn two_sided_offsets(&self, alpha: f64, method: QuantileMethod) -> Result<(f64, f64), ConformalError> {
        let level = 1.0 - alpha / 2.0;
        let q_high = conformal_quantile(&self.values, level, method)?;
        let negated: Vec<f64> = self.values.iter().map(|v| -v).collect();
        let q_low = -conformal_quantile(&negated, level, method)?;
        Ok((q_low, q_high))
    }

    /// Half width `q` so that `yhat +- q` covers with probability at least `1 - alpha`.
    pub fn symmetric_offset(&self, alpha: f64, method: QuantileMethod) -> Result<f64, ConformalError> {
        conformal_quantile(&self.abs().values, 1.0 - alpha, method)
    }
}
