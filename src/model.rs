//! Model capability
//!
//! The conformal strategies never look inside a model. They only need to
//! fit one on a [`Dataset`] and ask it for predictions on feature vectors.
//! Point models implement [`Regressor`], quantile models implement
//! [`QuantileRegressor`]; fitting is expressed by [`Fit`] / [`QuantileFit`],
//! both implemented for plain closures.
use crate::data::{Dataset, Matrix};
use crate::errors::ConformalError;
use rayon::prelude::*;
use std::sync::Arc;

/// A fitted point-prediction model.
pub trait Regressor: Send + Sync {
    /// Predict the outcome for a single feature vector.
    fn predict_row(&self, row: &[f64]) -> Result<f64, ConformalError>;

    /// Predict every row of `data`.
    ///
    /// * `data` - Features to predict on.
    /// * `parallel` - Predict rows on the rayon pool.
    fn predict(&self, data: &Matrix<f64>, parallel: bool) -> Result<Vec<f64>, ConformalError> {
        if parallel {
            (0..data.rows)
                .into_par_iter()
                .map(|i| self.predict_row(&data.get_row(i)))
                .collect()
        } else {
            (0..data.rows).map(|i| self.predict_row(&data.get_row(i))).collect()
        }
    }
}

/// A fitted model that predicts conditional quantiles.
pub trait QuantileRegressor: Send + Sync {
    /// Levels the model was fit for.
    fn levels(&self) -> Vec<f64>;

    /// Predict the requested quantile levels for one feature vector.
    /// Values are returned in the order of `levels`.
    fn predict_quantiles(&self, row: &[f64], levels: &[f64]) -> Result<Vec<f64>, ConformalError>;
}

impl<R: Regressor + ?Sized> Regressor for Arc<R> {
    fn predict_row(&self, row: &[f64]) -> Result<f64, ConformalError> {
        (**self).predict_row(row)
    }
}

impl<R: QuantileRegressor + ?Sized> QuantileRegressor for Arc<R> {
    fn levels(&self) -> Vec<f64> {
        (**self).levels()
    }

    fn predict_quantiles(&self, row: &[f64], levels: &[f64]) -> Result<Vec<f64>, ConformalError> {
        (**self).predict_quantiles(row, levels)
    }
}

/// Capability to train a point model.
pub trait Fit: Sync {
    type Model: Regressor + 'static;

    fn fit(&self, data: &Dataset) -> Result<Self::Model, ConformalError>;
}

impl<F, M> Fit for F
where
    F: Fn(&Dataset) -> Result<M, ConformalError> + Sync,
    M: Regressor + 'static,
{
    type Model = M;

    fn fit(&self, data: &Dataset) -> Result<M, ConformalError> {
        self(data)
    }
}

/// Capability to train a quantile model for a set of levels.
pub trait QuantileFit: Sync {
    type Model: QuantileRegressor + 'static;

    fn fit(&self, data: &Dataset, levels: &[f64]) -> Result<Self::Model, ConformalError>;
}

impl<F, M> QuantileFit for F
where
    F: Fn(&Dataset, &[f64]) -> Result<M, ConformalError> + Sync,
    M: QuantileRegressor + 'static,
{
    type Model = M;

    fn fit(&self, data: &Dataset, levels: &[f64]) -> Result<M, ConformalError> {
        self(data, levels)
    }
}
