//! Errors
//!
//! Custom error types used throughout the `conformal_intervals` crate.
use thiserror::Error;

/// Errors that can occur while calibrating or querying prediction intervals.
#[derive(Debug, Error)]
pub enum ConformalError {
    /// First value is the name of the argument, second is what was expected, third is what was passed.
    #[error("Invalid argument passed for {0}, expected {1} but {2} provided.")]
    InvalidArgument(String, String, String),
    /// Structural problem with the requested calibration (fold layout, strategy setup).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The calibration sample is too small for the requested level to be attainable.
    /// Values are the required conformal rank and the calibration sample size.
    #[error("Calibration sample of size {1} is too small, rank {0} is required for level {2}.")]
    DegenerateCalibration(usize, usize, f64),
    /// A prediction level was requested that the stored calibration does not support.
    #[error("Requested level {0} is not covered by the calibrated levels {1:?}.")]
    LevelMismatch(f64, Vec<f64>),
    /// Feature vector or outcome length does not line up with the data.
    #[error("Shape mismatch for {0}: expected {1}, found {2}.")]
    ShapeMismatch(String, usize, usize),
    /// Error raised by a wrapped model, propagated unchanged.
    #[error(transparent)]
    Model(#[from] Box<dyn std::error::Error + Send + Sync>),
    /// Unable to write a json artifact to file.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read a json artifact from file.
    #[error("Unable to read from file {0}")]
    UnableToRead(String),
}

impl ConformalError {
    pub(crate) fn invalid_argument(name: &str, expected: &str, provided: impl ToString) -> Self {
        ConformalError::InvalidArgument(name.to_string(), expected.to_string(), provided.to_string())
    }
}
