//! Simulation tests across strategies.
use crate::config::ConformalConfig;
use crate::conformal::*;
use crate::data::{Dataset, Matrix};
use crate::errors::ConformalError;
use crate::metrics::{empirical_coverage, width_std};
use crate::model::Regressor;
use crate::models::{LinearQuantileRegression, LinearRegression};
use crate::resampling::Folds;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Standard normal draw by Box-Muller.
fn normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// `y = 1 + x / 2 + N(0, sd)` with `x` uniform on `[0, 10)`.
fn linear_data(rng: &mut StdRng, n: usize, sd: f64) -> Dataset {
    let x: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * 10.0).collect();
    let y: Vec<f64> = x.iter().map(|x_| 1.0 + x_ / 2.0 + sd * normal(rng)).collect();
    Dataset::new(x, y, 1).unwrap()
}

/// `y = x + x * N(0, 0.5)` with `x` uniform on `[0.5, 5)`: noise grows with `x`.
fn heteroscedastic_data(rng: &mut StdRng, n: usize) -> Dataset {
    let x: Vec<f64> = (0..n).map(|_| 0.5 + rng.gen::<f64>() * 4.5).collect();
    let y: Vec<f64> = x.iter().map(|x_| x_ + 0.5 * x_ * normal(rng)).collect();
    Dataset::new(x, y, 1).unwrap()
}

fn fit_ols(data: &Dataset) -> Arc<dyn Regressor> {
    Arc::new(LinearRegression::fit(data).unwrap())
}

fn check_ordered(intervals: &[IntervalResult]) {
    for iv in intervals {
        assert!(
            iv.lower_bound <= iv.point_prediction && iv.point_prediction <= iv.upper_bound,
            "{:?}",
            iv
        );
    }
}

#[test]
fn test_split_end_to_end() {
    let mut rng = StdRng::seed_from_u64(42);
    let train = linear_data(&mut rng, 250, 0.25);
    let cal = linear_data(&mut rng, 250, 0.25);
    let test = linear_data(&mut rng, 2000, 0.25);

    let adj = calibrate_split(fit_ols(&train), &cal, 0.1).unwrap();
    let predictor = ConformalPredictor::new(adj);
    let intervals = predictor.predict_interval(&test.matrix(), 0.9).unwrap();
    check_ordered(&intervals);

    let coverage = empirical_coverage(&intervals, test.y()).unwrap();
    assert!((0.85..=0.95).contains(&coverage), "coverage {}", coverage);
    // 1.645 * 0.25 on either side for a well specified model.
    let width = intervals[0].width();
    assert!(width > 0.6 && width < 1.1, "width {}", width);
}

#[test]
fn test_split_coverage_over_repeated_splits() {
    let mut rng = StdRng::seed_from_u64(7);
    let reps = 200;
    let mut total = 0.0;
    for _ in 0..reps {
        let train = linear_data(&mut rng, 500, 1.0);
        let cal = linear_data(&mut rng, 500, 1.0);
        let test = linear_data(&mut rng, 500, 1.0);
        let predictor = ConformalPredictor::new(calibrate_split(fit_ols(&train), &cal, 0.1).unwrap());
        total += predictor.evaluate(&test, 0.9).unwrap().coverage;
    }
    let coverage = total / reps as f64;
    assert!(coverage >= 0.85, "average coverage {}", coverage);
    assert!(coverage <= 0.95, "average coverage {}", coverage);
}

#[test]
fn test_cv_plus_coverage() {
    let mut rng = StdRng::seed_from_u64(3);
    let train = linear_data(&mut rng, 200, 1.0);
    let test = linear_data(&mut rng, 1000, 1.0);
    let folds = Folds::k_fold(train.rows(), 10, 3).unwrap();
    let adj = calibrate_cv_plus(&LinearRegression::fit, &train, &folds, 0.1).unwrap();
    let predictor = ConformalPredictor::new(adj);

    let metrics = predictor.evaluate(&test, 0.9).unwrap();
    assert!(metrics.coverage >= 0.8, "coverage {}", metrics.coverage);
    assert!(metrics.coverage <= 0.97, "coverage {}", metrics.coverage);
    check_ordered(&predictor.predict_interval(&test.matrix(), 0.9).unwrap());
}

#[test]
fn test_cqr_adapts_width_where_split_does_not() {
    let mut rng = StdRng::seed_from_u64(11);
    let train = heteroscedastic_data(&mut rng, 1000);
    let cal = heteroscedastic_data(&mut rng, 1000);
    let test = heteroscedastic_data(&mut rng, 1000);

    let cqr = ConformalPredictor::new(calibrate_cqr(&LinearQuantileRegression::fit, &train, &cal, 0.1).unwrap());
    let split = ConformalPredictor::new(calibrate_split(fit_ols(&train), &cal, 0.1).unwrap());

    let cqr_intervals = cqr.predict_interval(&test.matrix(), 0.9).unwrap();
    let split_intervals = split.predict_interval(&test.matrix(), 0.9).unwrap();
    check_ordered(&cqr_intervals);

    assert!(width_std(&split_intervals).unwrap() < 1e-9);
    assert!(width_std(&cqr_intervals).unwrap() > 0.3);

    let x = vec![1.0, 4.0];
    let at_points = cqr.predict_interval(&Matrix::new(&x, 2, 1), 0.9).unwrap();
    assert!(at_points[1].width() > 2.0 * at_points[0].width());

    let coverage = empirical_coverage(&cqr_intervals, test.y()).unwrap();
    assert!((0.85..=0.95).contains(&coverage), "coverage {}", coverage);
}

#[test]
fn test_every_strategy_orders_bounds_at_large_alpha() {
    let mut rng = StdRng::seed_from_u64(13);
    let train = linear_data(&mut rng, 200, 1.0);
    let cal = linear_data(&mut rng, 200, 1.0);
    let test = linear_data(&mut rng, 300, 1.0);
    let folds = Folds::k_fold(train.rows(), 10, 1).unwrap();
    for alpha in [0.5, 0.7, 0.95] {
        let level = 1.0 - alpha;
        let adjustments: Vec<Adjustment> = vec![
            calibrate_split(fit_ols(&train), &cal, alpha).unwrap().into(),
            calibrate_cv_plus(&LinearRegression::fit, &train, &folds, alpha).unwrap().into(),
            calibrate_cqr(&LinearQuantileRegression::fit, &train, &cal, alpha).unwrap().into(),
        ];
        for adj in &adjustments {
            check_ordered(&predict_interval(adj, &test.matrix(), level).unwrap());
        }
    }
}

#[test]
fn test_predict_interval_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(5);
    let train = linear_data(&mut rng, 100, 0.5);
    let cal = linear_data(&mut rng, 100, 0.5);
    let test = linear_data(&mut rng, 50, 0.5);
    let folds = Folds::k_fold(train.rows(), 5, 0).unwrap();

    let adjustments: Vec<Adjustment> = vec![
        calibrate_split(fit_ols(&train), &cal, 0.2).unwrap().into(),
        calibrate_cv_plus(&LinearRegression::fit, &train, &folds, 0.2).unwrap().into(),
        calibrate_cqr(&LinearQuantileRegression::fit, &train, &cal, 0.2).unwrap().into(),
    ];
    for adj in &adjustments {
        let first = predict_interval(adj, &test.matrix(), 0.8).unwrap();
        let second = predict_interval(adj, &test.matrix(), 0.8).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_sequential_and_parallel_prediction_agree() {
    let mut rng = StdRng::seed_from_u64(9);
    let train = linear_data(&mut rng, 100, 0.5);
    let cal = linear_data(&mut rng, 100, 0.5);
    let test = linear_data(&mut rng, 200, 0.5);
    let model = fit_ols(&train);
    let par = SplitConformal::new(ConformalConfig::default())
        .calibrate(model.clone(), &cal, 0.1)
        .unwrap();
    let seq = SplitConformal::new(ConformalConfig::default().set_parallel(false))
        .calibrate(model, &cal, 0.1)
        .unwrap();
    assert_eq!(
        par.predict_interval(&test.matrix(), 0.9).unwrap(),
        seq.predict_interval(&test.matrix(), 0.9).unwrap()
    );
}

#[test]
fn test_single_record_calibration_is_degenerate() {
    let mut rng = StdRng::seed_from_u64(1);
    let train = linear_data(&mut rng, 50, 0.5);
    let cal = linear_data(&mut rng, 1, 0.5);
    assert!(matches!(
        calibrate_split(fit_ols(&train), &cal, 0.1),
        Err(ConformalError::DegenerateCalibration(2, 1, _))
    ));
    assert!(matches!(
        calibrate_cqr(&LinearQuantileRegression::fit, &train, &cal, 0.1),
        Err(ConformalError::DegenerateCalibration(2, 1, _))
    ));
}

#[test]
fn test_summary_json_round_trip() {
    use crate::config::ConformalIO;
    let mut rng = StdRng::seed_from_u64(2);
    let train = linear_data(&mut rng, 200, 0.5);
    let cal = linear_data(&mut rng, 200, 0.5);
    let adj = calibrate_cqr_levels(&LinearQuantileRegression::fit, &train, &cal, &[0.1, 0.2]).unwrap();
    let summary = adj.summary();
    assert_eq!(summary.strategy, Strategy::Cqr);
    assert_eq!(summary.n_calibration, 200);
    assert_eq!(summary.adjustments.len(), 2);
    let loaded = CalibrationSummary::from_json(&summary.json_dump().unwrap()).unwrap();
    assert_eq!(loaded, summary);
}
