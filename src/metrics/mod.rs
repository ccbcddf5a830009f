//! Metrics
//!
//! Evaluation of produced intervals against observed outcomes, plus
//! point and quantile losses for the underlying predictions.
pub mod interval;
pub mod regression;

pub use interval::{empirical_coverage, interval_score, mean_width, width_std, IntervalMetrics};
pub use regression::{pinball, pinball_loss, root_mean_squared_error};
