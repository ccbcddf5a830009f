//! CV+
//!
//! Cross-validation conformal. Every training record gets an out-of-fold
//! residual from a model that never saw it, and each fold model is kept.
//! At prediction time the bounds are order statistics of
//! `fold_model_k(x) -+ |residual_i|` over all out-of-fold records `i`, which
//! uses all data for both fitting and calibration.
//!
//! The `1 - 2 * alpha` coverage bound only holds for a disjoint K-fold cover;
//! other layouts are accepted and reported as unverified.
use crate::config::ConformalConfig;
use crate::conformal::{CalibrationSummary, IntervalResult, IntervalStrategy, Strategy};
use crate::data::Dataset;
use crate::errors::ConformalError;
use crate::model::{Fit, Regressor};
use crate::quantile::check_attainable;
use crate::resampling::{Folds, Partition, Resampling};
use crate::residuals::ResidualSample;
use crate::utils::{alpha_key, float_cmp, median, validate_alpha};
use log::{info, warn};
use rayon::prelude::*;
use std::sync::Arc;

/// Calibrator for CV+ intervals.
#[derive(Clone, Debug, Default)]
pub struct CvPlusConformal {
    pub config: ConformalConfig,
}

/// Fold models plus the out-of-fold residual of every held-out record.
pub struct CvPlusAdjustment {
    fold_models: Vec<Arc<dyn Regressor>>,
    /// Fold that produced each residual.
    fold_of: Vec<usize>,
    residuals: ResidualSample,
    alpha: f64,
    lower_rank: usize,
    upper_rank: usize,
    resampling: Resampling,
    coverage_verified: bool,
    config: ConformalConfig,
}

/// Output slot of one fold: its model and the residuals of its held-out records.
type FoldSlot = (Arc<dyn Regressor>, Vec<f64>);

fn fit_fold<F: Fit>(fit_fn: &F, train_data: &Dataset, partition: &Partition) -> Result<FoldSlot, ConformalError> {
    let model: Arc<dyn Regressor> = Arc::new(fit_fn.fit(&train_data.subset(&partition.train))?);
    let y = train_data.y();
    let held_out = partition
        .holdout
        .iter()
        .map(|i| Ok(y[*i] - model.predict_row(&train_data.row(*i))?))
        .collect::<Result<Vec<_>, ConformalError>>()?;
    Ok((model, held_out))
}

impl CvPlusConformal {
    pub fn new(config: ConformalConfig) -> Self {
        CvPlusConformal { config }
    }

    /// Fit one model per fold and collect out-of-fold residuals.
    ///
    /// * `fit_fn` - Model fitting capability.
    /// * `train_data` - Training records, indexed by `folds`.
    /// * `folds` - Fold layout over `train_data`.
    /// * `alpha` - Miscoverage level in `(0, 1)`.
    pub fn calibrate<F: Fit>(
        &self,
        fit_fn: &F,
        train_data: &Dataset,
        folds: &Folds,
        alpha: f64,
    ) -> Result<CvPlusAdjustment, ConformalError> {
        validate_alpha(alpha)?;
        folds.validate()?;
        if folds.n_records() != train_data.rows() {
            return Err(ConformalError::ShapeMismatch(
                "folds".to_string(),
                train_data.rows(),
                folds.n_records(),
            ));
        }
        let n: usize = folds.partitions().iter().map(|p| p.holdout.len()).sum();
        let upper_rank = check_attainable(n, 1.0 - alpha)?;
        let lower_rank = n + 1 - upper_rank;

        // One slot per fold, filled independently and joined before aggregation.
        let slots: Vec<FoldSlot> = if self.config.parallel {
            let pool = self.config.thread_pool()?;
            pool.install(|| {
                folds
                    .partitions()
                    .par_iter()
                    .map(|p| fit_fold(fit_fn, train_data, p))
                    .collect::<Result<Vec<_>, ConformalError>>()
            })?
        } else {
            folds
                .partitions()
                .iter()
                .map(|p| fit_fold(fit_fn, train_data, p))
                .collect::<Result<Vec<_>, ConformalError>>()?
        };

        let mut fold_models = Vec::with_capacity(slots.len());
        let mut fold_of = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);
        for (k, (model, held_out)) in slots.into_iter().enumerate() {
            fold_models.push(model);
            for r in held_out {
                fold_of.push(k);
                values.push(r);
            }
        }
        let residuals = ResidualSample::new(values)?;

        let coverage_verified = folds.is_disjoint_cover();
        if !coverage_verified {
            warn!(
                "Fold layout {:?} is not a disjoint K-fold cover, CV+ coverage is unverified.",
                folds.resampling()
            );
        }
        info!(
            "Calibrated CV+ with {} folds on {} out-of-fold residuals at alpha {}.",
            fold_models.len(),
            n,
            alpha
        );
        Ok(CvPlusAdjustment {
            fold_models,
            fold_of,
            residuals,
            alpha,
            lower_rank,
            upper_rank,
            resampling: folds.resampling(),
            coverage_verified,
            config: self.config.clone(),
        })
    }

    /// Calibrate on a shuffled `k`-fold layout seeded from the configuration.
    pub fn calibrate_k_fold<F: Fit>(
        &self,
        fit_fn: &F,
        train_data: &Dataset,
        k: usize,
        alpha: f64,
    ) -> Result<CvPlusAdjustment, ConformalError> {
        let folds = Folds::k_fold(train_data.rows(), k, self.config.seed)?;
        self.calibrate(fit_fn, train_data, &folds, alpha)
    }
}

/// Calibrate CV+ intervals with the default configuration.
pub fn calibrate_cv_plus<F: Fit>(
    fit_fn: &F,
    train_data: &Dataset,
    folds: &Folds,
    alpha: f64,
) -> Result<CvPlusAdjustment, ConformalError> {
    CvPlusConformal::default().calibrate(fit_fn, train_data, folds, alpha)
}

impl CvPlusAdjustment {
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn n_folds(&self) -> usize {
        self.fold_models.len()
    }

    /// Out-of-fold residuals `y - yhat`, in fold order.
    pub fn residuals(&self) -> &ResidualSample {
        &self.residuals
    }

    /// False when the fold layout voids the coverage proof.
    pub fn coverage_verified(&self) -> bool {
        self.coverage_verified
    }

    pub fn resampling(&self) -> Resampling {
        self.resampling
    }

    /// Ranks `(lower, upper)` of the order statistics used for the bounds.
    pub fn ranks(&self) -> (usize, usize) {
        (self.lower_rank, self.upper_rank)
    }
}

impl IntervalStrategy for CvPlusAdjustment {
    fn strategy(&self) -> Strategy {
        Strategy::CvPlus
    }

    fn alphas(&self) -> Vec<f64> {
        vec![self.alpha]
    }

    fn config(&self) -> &ConformalConfig {
        &self.config
    }

    fn predict_row(&self, row: &[f64], _alpha: f64) -> Result<IntervalResult, ConformalError> {
        let fold_preds = self
            .fold_models
            .iter()
            .map(|m| m.predict_row(row))
            .collect::<Result<Vec<f64>, ConformalError>>()?;
        let per_record: Vec<f64> = self.fold_of.iter().map(|k| fold_preds[*k]).collect();
        let mut lows: Vec<f64> = per_record
            .iter()
            .zip(self.residuals.values())
            .map(|(mu, r)| mu - r.abs())
            .collect();
        let mut highs: Vec<f64> = per_record
            .iter()
            .zip(self.residuals.values())
            .map(|(mu, r)| mu + r.abs())
            .collect();
        let (_, lower, _) = lows.select_nth_unstable_by(self.lower_rank - 1, float_cmp);
        let mut lower = *lower;
        let (_, upper, _) = highs.select_nth_unstable_by(self.upper_rank - 1, float_cmp);
        let mut upper = *upper;
        // For alpha >= 0.5 the lower rank passes the upper one and
        // disagreeing fold models can reverse the bounds.
        let crossing = lower > upper;
        if crossing {
            std::mem::swap(&mut lower, &mut upper);
        }
        // The residual sample is never empty, so neither is per_record.
        let point = median(&per_record).unwrap_or((lower + upper) / 2.0).clamp(lower, upper);
        Ok(IntervalResult {
            point_prediction: point,
            lower_bound: lower,
            upper_bound: upper,
            crossing,
        })
    }

    fn summary(&self) -> CalibrationSummary {
        CalibrationSummary {
            strategy: Strategy::CvPlus,
            alphas: vec![self.alpha],
            n_calibration: self.residuals.len(),
            adjustments: [(
                alpha_key(self.alpha),
                vec![self.lower_rank as f64, self.upper_rank as f64],
            )]
            .into_iter()
            .collect(),
            coverage_verified: self.coverage_verified,
            quantile_method: self.config.quantile_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Matrix;
    use crate::models::LinearRegression;

    fn train(n: usize) -> Dataset {
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..n).map(|i| 2.0 * i as f64 + ((i % 5) as f64 - 2.0)).collect();
        Dataset::from_rows(&rows, y).unwrap()
    }

    #[test]
    fn test_cv_plus_brackets_the_line() {
        let data = train(100);
        let folds = Folds::k_fold(100, 10, 0).unwrap();
        let adj = calibrate_cv_plus(&LinearRegression::fit, &data, &folds, 0.1).unwrap();
        assert_eq!(adj.n_folds(), 10);
        assert_eq!(adj.residuals().len(), 100);
        assert!(adj.coverage_verified());
        assert_eq!(adj.ranks(), (10, 91));

        let x = vec![10.0, 50.0];
        let m = Matrix::new(&x, 2, 1);
        for (iv, xi) in adj.predict_interval(&m, 0.9).unwrap().iter().zip(&x) {
            assert!(iv.lower_bound <= iv.point_prediction && iv.point_prediction <= iv.upper_bound);
            assert!((iv.point_prediction - 2.0 * xi).abs() < 0.5);
            assert!(iv.width() > 2.0 && iv.width() < 6.0, "width {}", iv.width());
        }
    }

    #[test]
    fn test_cv_plus_parallel_matches_sequential() {
        let data = train(60);
        let folds = Folds::k_fold(60, 5, 3).unwrap();
        let par = CvPlusConformal::new(ConformalConfig::default().set_num_threads(Some(2)))
            .calibrate(&LinearRegression::fit, &data, &folds, 0.2)
            .unwrap();
        let seq = CvPlusConformal::new(ConformalConfig::default().set_parallel(false))
            .calibrate(&LinearRegression::fit, &data, &folds, 0.2)
            .unwrap();
        assert_eq!(par.residuals(), seq.residuals());
        let x = vec![7.5];
        let m = Matrix::new(&x, 1, 1);
        assert_eq!(
            par.predict_interval(&m, 0.8).unwrap(),
            seq.predict_interval(&m, 0.8).unwrap()
        );
    }

    #[test]
    fn test_cv_plus_k_fold_uses_config_seed() {
        let data = train(50);
        let config = ConformalConfig::default().set_seed(4);
        let adj = CvPlusConformal::new(config)
            .calibrate_k_fold(&LinearRegression::fit, &data, 5, 0.2)
            .unwrap();
        let folds = Folds::k_fold(50, 5, 4).unwrap();
        let expected = calibrate_cv_plus(&LinearRegression::fit, &data, &folds, 0.2).unwrap();
        assert_eq!(adj.residuals(), expected.residuals());
    }

    struct Constant(f64);

    impl Regressor for Constant {
        fn predict_row(&self, _row: &[f64]) -> Result<f64, ConformalError> {
            Ok(self.0)
        }
    }

    /// Predicts the mean feature value of its training records.
    fn mean_feature(data: &Dataset) -> Result<Constant, ConformalError> {
        let col = data.matrix().get_col(0).to_vec();
        Ok(Constant(col.iter().sum::<f64>() / col.len() as f64))
    }

    /// Two folds whose models predict 0 and 1 and fit their held-out records exactly.
    fn disagreeing_folds() -> (Dataset, Folds) {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![if i < 5 { 1.0 } else { 0.0 }]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 0.0 } else { 1.0 }).collect();
        let folds = Folds::from_assignment(&[0, 0, 0, 0, 0, 1, 1, 1, 1, 1]).unwrap();
        (Dataset::from_rows(&rows, y).unwrap(), folds)
    }

    #[test]
    fn test_cv_plus_reorders_reversed_bounds() {
        let (data, folds) = disagreeing_folds();
        let adj = calibrate_cv_plus(&mean_feature, &data, &folds, 0.9).unwrap();
        assert_eq!(adj.ranks(), (9, 2));
        assert!(adj.residuals().values().iter().all(|r| *r == 0.0));

        let iv = adj.predict_row(&[0.5], 0.9).unwrap();
        assert!(iv.crossing);
        assert_eq!((iv.lower_bound, iv.upper_bound), (0.0, 1.0));
        assert!(iv.lower_bound <= iv.point_prediction && iv.point_prediction <= iv.upper_bound);
    }

    #[test]
    fn test_cv_plus_ordered_bounds_are_not_flagged() {
        let (data, folds) = disagreeing_folds();
        let adj = calibrate_cv_plus(&mean_feature, &data, &folds, 0.2).unwrap();
        let iv = adj.predict_row(&[0.5], 0.2).unwrap();
        assert!(!iv.crossing);
        assert!(iv.lower_bound <= iv.point_prediction && iv.point_prediction <= iv.upper_bound);
    }

    #[test]
    fn test_cv_plus_alpha_near_one_does_not_panic() {
        let data = train(4);
        let folds = Folds::k_fold(4, 2, 0).unwrap();
        let adj = calibrate_cv_plus(&LinearRegression::fit, &data, &folds, 1.0 - 1e-11).unwrap();
        assert_eq!(adj.ranks(), (4, 1));
        let iv = adj.predict_row(&[1.5], 1.0 - 1e-11).unwrap();
        assert!(iv.lower_bound <= iv.point_prediction && iv.point_prediction <= iv.upper_bound);
    }

    #[test]
    fn test_cv_plus_bootstrap_is_flagged() {
        let data = train(80);
        let folds = Folds::bootstrap(80, 10, 1).unwrap();
        let adj = calibrate_cv_plus(&LinearRegression::fit, &data, &folds, 0.1).unwrap();
        assert!(!adj.coverage_verified());
        assert_eq!(adj.resampling(), Resampling::Bootstrap);
        assert!(!adj.summary().coverage_verified);
    }

    #[test]
    fn test_cv_plus_errors() {
        let data = train(30);
        let folds = Folds::k_fold(20, 4, 0).unwrap();
        assert!(matches!(
            calibrate_cv_plus(&LinearRegression::fit, &data, &folds, 0.1),
            Err(ConformalError::ShapeMismatch(..))
        ));
        let small = train(5);
        let folds = Folds::k_fold(5, 5, 0).unwrap();
        assert!(matches!(
            calibrate_cv_plus(&LinearRegression::fit, &small, &folds, 0.1),
            Err(ConformalError::DegenerateCalibration(..))
        ));
    }

    #[test]
    fn test_cv_plus_propagates_fit_errors() {
        let data = train(30);
        let folds = Folds::k_fold(30, 3, 0).unwrap();
        let failing = |_: &Dataset| -> Result<LinearRegression, ConformalError> {
            Err(ConformalError::Model("solver diverged".into()))
        };
        let err = calibrate_cv_plus(&failing, &data, &folds, 0.1).err().unwrap();
        assert_eq!(err.to_string(), "solver diverged");
    }
}
