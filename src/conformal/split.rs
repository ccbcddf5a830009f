//! Split conformal
//!
//! One fitted model, one calibration set. The residual quantiles become two
//! fixed offsets added to every point prediction.
use crate::config::ConformalConfig;
use crate::conformal::{CalibrationSummary, IntervalResult, IntervalStrategy, Strategy};
use crate::data::Dataset;
use crate::errors::ConformalError;
use crate::model::Regressor;
use crate::residuals::ResidualSample;
use crate::utils::{alpha_key, validate_alpha};
use log::info;
use std::sync::Arc;

/// Calibrator for split conformal intervals.
#[derive(Clone, Debug, Default)]
pub struct SplitConformal {
    pub config: ConformalConfig,
    /// Use `yhat +- q` with `q` the quantile of absolute residuals
    /// instead of separate lower and upper tail offsets.
    pub symmetric: bool,
}

/// Split conformal calibration result: the shared model and its two offsets.
pub struct SplitAdjustment {
    model: Arc<dyn Regressor>,
    alpha: f64,
    q_low: f64,
    q_high: f64,
    residuals: ResidualSample,
    config: ConformalConfig,
}

impl SplitConformal {
    pub fn new(config: ConformalConfig) -> Self {
        SplitConformal {
            config,
            symmetric: false,
        }
    }

    /// Set whether intervals are symmetric around the point prediction.
    pub fn set_symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    /// Calibrate `model` on held-out records.
    ///
    /// * `model` - Fitted point model, never trained on `cal_data`.
    /// * `cal_data` - Calibration records.
    /// * `alpha` - Miscoverage level in `(0, 1)`.
    pub fn calibrate(
        &self,
        model: Arc<dyn Regressor>,
        cal_data: &Dataset,
        alpha: f64,
    ) -> Result<SplitAdjustment, ConformalError> {
        validate_alpha(alpha)?;
        if cal_data.is_empty() {
            return Err(ConformalError::invalid_argument(
                "cal_data",
                "at least one calibration record",
                "empty dataset",
            ));
        }
        let yhat = model.predict(&cal_data.matrix(), self.config.parallel)?;
        let residuals = ResidualSample::from_predictions(cal_data.y(), &yhat)?;
        let method = self.config.quantile_method;
        let (q_low, q_high) = if self.symmetric {
            let q = residuals.symmetric_offset(alpha, method)?;
            (-q, q)
        } else {
            residuals.two_sided_offsets(alpha, method)?
        };
        // A biased model can leave both offsets on one side of zero. Widening
        // to include zero keeps the point inside the band and only adds coverage.
        let (q_low, q_high) = (q_low.min(0.0), q_high.max(0.0));
        info!(
            "Calibrated split conformal on {} records at alpha {}, offsets [{}, {}].",
            residuals.len(),
            alpha,
            q_low,
            q_high
        );
        Ok(SplitAdjustment {
            model,
            alpha,
            q_low,
            q_high,
            residuals,
            config: self.config.clone(),
        })
    }
}

/// Calibrate split conformal intervals with the default configuration.
pub fn calibrate_split(
    model: Arc<dyn Regressor>,
    cal_data: &Dataset,
    alpha: f64,
) -> Result<SplitAdjustment, ConformalError> {
    SplitConformal::default().calibrate(model, cal_data, alpha)
}

impl SplitAdjustment {
    /// Offsets `(q_low, q_high)` added to the point prediction.
    pub fn offsets(&self) -> (f64, f64) {
        (self.q_low, self.q_high)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Calibration residuals `y - yhat`.
    pub fn residuals(&self) -> &ResidualSample {
        &self.residuals
    }

    /// Interval width, the same for every input.
    pub fn width(&self) -> f64 {
        self.q_high - self.q_low
    }
}

impl IntervalStrategy for SplitAdjustment {
    fn strategy(&self) -> Strategy {
        Strategy::Split
    }

    fn alphas(&self) -> Vec<f64> {
        vec![self.alpha]
    }

    fn config(&self) -> &ConformalConfig {
        &self.config
    }

    fn predict_row(&self, row: &[f64], _alpha: f64) -> Result<IntervalResult, ConformalError> {
        let point = self.model.predict_row(row)?;
        Ok(IntervalResult::new(point, point + self.q_low, point + self.q_high))
    }

    fn summary(&self) -> CalibrationSummary {
        CalibrationSummary {
            strategy: Strategy::Split,
            alphas: vec![self.alpha],
            n_calibration: self.residuals.len(),
            adjustments: [(alpha_key(self.alpha), vec![self.q_low, self.q_high])].into_iter().collect(),
            coverage_verified: true,
            quantile_method: self.config.quantile_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Matrix;

    struct Shift(f64);

    impl Regressor for Shift {
        fn predict_row(&self, row: &[f64]) -> Result<f64, ConformalError> {
            Ok(row[0] + self.0)
        }
    }

    fn calibration(n: usize) -> Dataset {
        // y = x + r with r cycling through -2..=2
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..n).map(|i| i as f64 + ((i % 5) as f64 - 2.0)).collect();
        Dataset::from_rows(&rows, y).unwrap()
    }

    #[test]
    fn test_split_offsets_and_constant_width() {
        let adj = calibrate_split(Arc::new(Shift(0.0)), &calibration(100), 0.1).unwrap();
        let (lo, hi) = adj.offsets();
        assert_eq!(lo, -2.0);
        assert_eq!(hi, 2.0);

        let x = vec![0.0, 5.0, 50.0];
        let data = Matrix::new(&x, 3, 1);
        let intervals = adj.predict_interval(&data, 0.9).unwrap();
        for (iv, xi) in intervals.iter().zip(&x) {
            assert_eq!(iv.point_prediction, *xi);
            assert_eq!(iv.width(), 4.0);
            assert!(iv.lower_bound <= iv.point_prediction && iv.point_prediction <= iv.upper_bound);
        }
    }

    #[test]
    fn test_split_symmetric() {
        let adj = SplitConformal::default()
            .set_symmetric(true)
            .calibrate(Arc::new(Shift(0.0)), &calibration(100), 0.1)
            .unwrap();
        assert_eq!(adj.offsets(), (-2.0, 2.0));
    }

    #[test]
    fn test_split_follows_model_bias() {
        // A model that is off by +1 still gets valid offsets, shifted down.
        let adj = calibrate_split(Arc::new(Shift(1.0)), &calibration(100), 0.1).unwrap();
        assert_eq!(adj.offsets(), (-3.0, 1.0));
    }

    #[test]
    fn test_split_one_sided_residuals_keep_point_inside() {
        // y = x + 5 + r, every residual of the unshifted model is positive.
        let rows: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..100).map(|i| i as f64 + 5.0 + ((i % 5) as f64 - 2.0)).collect();
        let cal = Dataset::from_rows(&rows, y).unwrap();
        let adj = calibrate_split(Arc::new(Shift(0.0)), &cal, 0.1).unwrap();
        assert_eq!(adj.offsets(), (0.0, 7.0));

        let x = vec![1.0];
        let iv = adj.predict_interval(&Matrix::new(&x, 1, 1), 0.9).unwrap()[0];
        assert_eq!((iv.lower_bound, iv.point_prediction, iv.upper_bound), (1.0, 1.0, 8.0));

        let adj = calibrate_split(Arc::new(Shift(20.0)), &cal, 0.1).unwrap();
        let iv = adj.predict_interval(&Matrix::new(&x, 1, 1), 0.9).unwrap()[0];
        assert_eq!(iv.upper_bound, iv.point_prediction);
        assert!(iv.lower_bound < iv.point_prediction);
    }

    #[test]
    fn test_split_errors() {
        let model: Arc<dyn Regressor> = Arc::new(Shift(0.0));
        assert!(matches!(
            calibrate_split(model.clone(), &calibration(1), 0.1),
            Err(ConformalError::DegenerateCalibration(..))
        ));
        assert!(matches!(
            calibrate_split(model.clone(), &calibration(10), 0.1),
            Err(ConformalError::DegenerateCalibration(..))
        ));
        assert!(matches!(
            calibrate_split(model.clone(), &calibration(100), 1.0),
            Err(ConformalError::InvalidArgument(..))
        ));
        let empty = Dataset::new(vec![], vec![], 1).unwrap();
        assert!(matches!(
            calibrate_split(model, &empty, 0.1),
            Err(ConformalError::InvalidArgument(..))
        ));
    }

    #[test]
    fn test_split_level_rules() {
        let adj = calibrate_split(Arc::new(Shift(0.0)), &calibration(100), 0.1).unwrap();
        let x = vec![1.0];
        let data = Matrix::new(&x, 1, 1);
        assert!(adj.predict_interval(&data, 0.8).is_ok());
        assert!(matches!(
            adj.predict_interval(&data, 0.95),
            Err(ConformalError::LevelMismatch(..))
        ));
        assert!(matches!(
            adj.predict_interval(&data, 1.0),
            Err(ConformalError::InvalidArgument(..))
        ));
    }

    #[test]
    fn test_split_summary() {
        let adj = calibrate_split(Arc::new(Shift(0.0)), &calibration(100), 0.1).unwrap();
        let summary = adj.summary();
        assert_eq!(summary.strategy, Strategy::Split);
        assert_eq!(summary.n_calibration, 100);
        assert_eq!(summary.adjustments["0.1"], vec![-2.0, 2.0]);
    }
}
