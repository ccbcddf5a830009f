use crate::data::Dataset;
use crate::errors::ConformalError;
use crate::model::Regressor;
use crate::utils::solve_linear_system;
use serde::{Deserialize, Serialize};

/// Solve the (optionally weighted) least squares problem with an intercept.
///
/// Returns the coefficients, intercept first.
pub(crate) fn least_squares(data: &Dataset, weights: Option<&[f64]>) -> Result<Vec<f64>, ConformalError> {
    let n = data.rows();
    let p = data.cols() + 1;
    if n < p {
        return Err(ConformalError::InvalidConfiguration(format!(
            "least squares needs at least {} records, {} provided",
            p, n
        )));
    }
    let m = data.matrix();
    let y = data.y();
    // Design column j is the intercept for j == 0, otherwise feature j - 1.
    let columns: Vec<Option<&[f64]>> = (0..p)
        .map(|j| if j == 0 { None } else { Some(m.get_col(j - 1)) })
        .collect();
    let value = |col: Option<&[f64]>, i: usize| col.map_or(1.0, |c| c[i]);

    let mut xtx = vec![0.0; p * p];
    let mut xty = vec![0.0; p];
    for a in 0..p {
        let col_a = columns[a];
        for b in a..p {
            let col_b = columns[b];
            let s: f64 = (0..n)
                .map(|i| weights.map_or(1.0, |w| w[i]) * value(col_a, i) * value(col_b, i))
                .sum();
            xtx[a * p + b] = s;
            xtx[b * p + a] = s;
        }
        xty[a] = (0..n)
            .map(|i| weights.map_or(1.0, |w| w[i]) * value(col_a, i) * y[i])
            .sum();
    }
    solve_linear_system(xtx, xty, p)
}

#[inline]
pub(crate) fn linear_predictor(coefficients: &[f64], row: &[f64]) -> Result<f64, ConformalError> {
    if row.len() + 1 != coefficients.len() {
        return Err(ConformalError::ShapeMismatch(
            "feature vector".to_string(),
            coefficients.len() - 1,
            row.len(),
        ));
    }
    Ok(coefficients[0] + row.iter().zip(&coefficients[1..]).map(|(x, b)| x * b).sum::<f64>())
}

/// Ordinary least squares regression with an intercept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearRegression {
    /// Intercept followed by one coefficient per feature.
    pub coefficients: Vec<f64>,
}

impl LinearRegression {
    /// Fit the model on `data`.
    pub fn fit(data: &Dataset) -> Result<Self, ConformalError> {
        Ok(LinearRegression {
            coefficients: least_squares(data, None)?,
        })
    }
}

impl Regressor for LinearRegression {
    fn predict_row(&self, row: &[f64]) -> Result<f64, ConformalError> {
        linear_predictor(&self.coefficients, row)
    }
}
