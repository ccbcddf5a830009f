//! Conformal Prediction Intervals
//! ===============================
//! Simulate data whose noise grows with the feature, then compare split
//! conformal, CV+ and conformalized quantile regression (CQR) intervals at
//! 90 % coverage.
//!
//! ```bash
//! cargo run --release --example conformal_intervals
//! ```

use conformal_intervals::metrics::IntervalMetrics;
use conformal_intervals::models::{LinearQuantileRegression, LinearRegression};
use conformal_intervals::{
    calibrate_cqr, calibrate_cv_plus, calibrate_split, ConformalIO, ConformalPredictor, Dataset, Folds, Regressor,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::sync::Arc;

fn simulate(rng: &mut StdRng, n: usize) -> Result<Dataset, Box<dyn Error>> {
    let x: Vec<f64> = (0..n).map(|_| 0.5 + rng.gen::<f64>() * 9.5).collect();
    let y: Vec<f64> = x
        .iter()
        .map(|x_| {
            let u1 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
            let u2 = rng.gen::<f64>();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            1.0 + x_ / 2.0 + 0.1 * x_ * z
        })
        .collect();
    Ok(Dataset::new(x, y, 1)?)
}

fn report(name: &str, metrics: &IntervalMetrics) {
    println!(
        "{:<6} coverage {:.3}  mean width {:.3}  width std {:.3}  interval score {:.3}",
        name, metrics.coverage, metrics.mean_width, metrics.width_std, metrics.interval_score
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    let level = 0.9;
    let alpha = 1.0 - level;

    // ------------------------------------------------------------------
    // 1. Simulate train, calibration and test records
    // ------------------------------------------------------------------
    let mut rng = StdRng::seed_from_u64(0);
    let train = simulate(&mut rng, 1000)?;
    let cal = simulate(&mut rng, 1000)?;
    let test = simulate(&mut rng, 2000)?;

    // ------------------------------------------------------------------
    // 2. Calibrate each strategy
    // ------------------------------------------------------------------
    let model: Arc<dyn Regressor> = Arc::new(LinearRegression::fit(&train)?);
    let split = ConformalPredictor::new(calibrate_split(model, &cal, alpha)?);

    let folds = Folds::k_fold(train.rows(), 10, 0)?;
    let cv_plus = ConformalPredictor::new(calibrate_cv_plus(&LinearRegression::fit, &train, &folds, alpha)?);

    let cqr = ConformalPredictor::new(calibrate_cqr(&LinearQuantileRegression::fit, &train, &cal, alpha)?);

    // ------------------------------------------------------------------
    // 3. Evaluate on the test set
    // ------------------------------------------------------------------
    println!("Target coverage {level}");
    report("split", &split.evaluate(&test, level)?);
    report("cv+", &cv_plus.evaluate(&test, level)?);
    report("cqr", &cqr.evaluate(&test, level)?);

    // ------------------------------------------------------------------
    // 4. Intervals at a few points
    // ------------------------------------------------------------------
    println!("\n{:>5} {:>22} {:>22}", "x", "split", "cqr");
    for x in [1.0, 5.0, 9.0] {
        let s = split.predict_one(&[x], level)?;
        let q = cqr.predict_one(&[x], level)?;
        println!(
            "{:>5.1} [{:>8.3}, {:>8.3}]   [{:>8.3}, {:>8.3}]",
            x, s.lower_bound, s.upper_bound, q.lower_bound, q.upper_bound
        );
    }

    println!("\nCQR calibration: {}", cqr.summary().json_dump()?);
    Ok(())
}
