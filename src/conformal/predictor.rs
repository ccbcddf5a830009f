//! Predictor
//!
//! [`Adjustment`] wraps any calibrated strategy behind one type, and
//! [`ConformalPredictor`] answers interval requests with it.
use crate::config::ConformalConfig;
use crate::conformal::{
    CalibrationSummary, CqrAdjustment, CvPlusAdjustment, IntervalResult, IntervalStrategy, SplitAdjustment, Strategy,
};
use crate::data::{Dataset, Matrix};
use crate::errors::ConformalError;
use crate::metrics::IntervalMetrics;
use std::sync::Arc;

/// A calibrated adjustment of any strategy.
#[derive(Clone)]
pub enum Adjustment {
    Split(Arc<SplitAdjustment>),
    CvPlus(Arc<CvPlusAdjustment>),
    Cqr(Arc<CqrAdjustment>),
    Custom(Arc<dyn IntervalStrategy>),
}

impl Adjustment {
    pub fn new_custom<T>(strategy: T) -> Self
    where
        T: IntervalStrategy + 'static,
    {
        Adjustment::Custom(Arc::new(strategy))
    }
}

impl From<SplitAdjustment> for Adjustment {
    fn from(adjustment: SplitAdjustment) -> Self {
        Adjustment::Split(Arc::new(adjustment))
    }
}

impl From<CvPlusAdjustment> for Adjustment {
    fn from(adjustment: CvPlusAdjustment) -> Self {
        Adjustment::CvPlus(Arc::new(adjustment))
    }
}

impl From<CqrAdjustment> for Adjustment {
    fn from(adjustment: CqrAdjustment) -> Self {
        Adjustment::Cqr(Arc::new(adjustment))
    }
}

impl IntervalStrategy for Adjustment {
    fn strategy(&self) -> Strategy {
        match self {
            Adjustment::Split(adj) => adj.strategy(),
            Adjustment::CvPlus(adj) => adj.strategy(),
            Adjustment::Cqr(adj) => adj.strategy(),
            Adjustment::Custom(arc) => arc.strategy(),
        }
    }

    fn alphas(&self) -> Vec<f64> {
        match self {
            Adjustment::Split(adj) => adj.alphas(),
            Adjustment::CvPlus(adj) => adj.alphas(),
            Adjustment::Cqr(adj) => adj.alphas(),
            Adjustment::Custom(arc) => arc.alphas(),
        }
    }

    fn config(&self) -> &ConformalConfig {
        match self {
            Adjustment::Split(adj) => adj.config(),
            Adjustment::CvPlus(adj) => adj.config(),
            Adjustment::Cqr(adj) => adj.config(),
            Adjustment::Custom(arc) => arc.config(),
        }
    }

    fn predict_row(&self, row: &[f64], alpha: f64) -> Result<IntervalResult, ConformalError> {
        match self {
            Adjustment::Split(adj) => adj.predict_row(row, alpha),
            Adjustment::CvPlus(adj) => adj.predict_row(row, alpha),
            Adjustment::Cqr(adj) => adj.predict_row(row, alpha),
            Adjustment::Custom(arc) => arc.predict_row(row, alpha),
        }
    }

    fn summary(&self) -> CalibrationSummary {
        match self {
            Adjustment::Split(adj) => adj.summary(),
            Adjustment::CvPlus(adj) => adj.summary(),
            Adjustment::Cqr(adj) => adj.summary(),
            Adjustment::Custom(arc) => arc.summary(),
        }
    }

    fn predict_interval(&self, data: &Matrix<f64>, level: f64) -> Result<Vec<IntervalResult>, ConformalError> {
        match self {
            Adjustment::Split(adj) => adj.predict_interval(data, level),
            Adjustment::CvPlus(adj) => adj.predict_interval(data, level),
            Adjustment::Cqr(adj) => adj.predict_interval(data, level),
            Adjustment::Custom(arc) => arc.predict_interval(data, level),
        }
    }
}

/// Intervals for every row of `new_inputs` at coverage `level`.
///
/// * `adjustment` - Calibrated adjustment of any strategy.
/// * `new_inputs` - Features to predict on.
/// * `level` - Target coverage in `(0, 1)`.
pub fn predict_interval(
    adjustment: &Adjustment,
    new_inputs: &Matrix<f64>,
    level: f64,
) -> Result<Vec<IntervalResult>, ConformalError> {
    adjustment.predict_interval(new_inputs, level)
}

/// Prediction interval service around one calibrated adjustment.
///
/// Cloning is cheap and clones share the adjustment.
#[derive(Clone)]
pub struct ConformalPredictor {
    pub adjustment: Adjustment,
}

impl ConformalPredictor {
    pub fn new(adjustment: impl Into<Adjustment>) -> Self {
        ConformalPredictor {
            adjustment: adjustment.into(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.adjustment.strategy()
    }

    /// Coverage levels this predictor was calibrated for, descending.
    pub fn levels(&self) -> Vec<f64> {
        self.adjustment.alphas().iter().map(|a| 1.0 - a).collect()
    }

    pub fn predict_interval(&self, new_inputs: &Matrix<f64>, level: f64) -> Result<Vec<IntervalResult>, ConformalError> {
        predict_interval(&self.adjustment, new_inputs, level)
    }

    /// Interval for a single feature vector.
    pub fn predict_one(&self, row: &[f64], level: f64) -> Result<IntervalResult, ConformalError> {
        let data = Matrix::new(row, 1, row.len());
        let mut intervals = self.predict_interval(&data, level)?;
        intervals
            .pop()
            .ok_or_else(|| ConformalError::ShapeMismatch("row".to_string(), 1, 0))
    }

    /// Predict on labelled `test_data` and score the intervals against its outcomes.
    pub fn evaluate(&self, test_data: &Dataset, level: f64) -> Result<IntervalMetrics, ConformalError> {
        let intervals = self.predict_interval(&test_data.matrix(), level)?;
        IntervalMetrics::evaluate(&intervals, test_data.y(), 1.0 - level)
    }

    pub fn summary(&self) -> CalibrationSummary {
        self.adjustment.summary()
    }
}
