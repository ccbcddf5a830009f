//! Reference Models
//!
//! Small linear fitters that implement the [`crate::model`] traits. They are
//! convenient baselines for calibration and are what the crate's own tests
//! and benchmarks wrap; any other model can be plugged in the same way.
//!
//! * `linear`: ordinary least squares point regression.
//! * `quantile_linear`: linear quantile regression fit by iteratively reweighted least squares.

pub mod linear;
pub mod quantile_linear;

pub use linear::LinearRegression;
pub use quantile_linear::LinearQuantileRegression;
