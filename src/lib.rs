// Modules
pub mod config;
pub mod conformal;
pub mod constants;
pub mod data;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod models;
pub mod quantile;
pub mod resampling;
pub mod residuals;
pub mod utils;

// Individual classes, and functions
pub use config::{ConformalConfig, ConformalIO};
pub use conformal::{
    calibrate_cqr, calibrate_cqr_levels, calibrate_cv_plus, calibrate_split, predict_interval, Adjustment,
    CalibrationSummary, ConformalPredictor, IntervalResult, IntervalStrategy, Strategy,
};
pub use data::{Dataset, Matrix};
pub use errors::ConformalError;
pub use model::{Fit, QuantileFit, QuantileRegressor, Regressor};
pub use quantile::QuantileMethod;
pub use resampling::Folds;
