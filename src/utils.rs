use crate::constants::PIVOT_TOLERANCE;
use crate::errors::ConformalError;
use std::cmp::Ordering;

pub fn fmt_vec_output(v: &[f64]) -> String {
    let mut res = String::new();
    if let Some(last) = v.len().checked_sub(1) {
        if last == 0 {
            return format!("{:.4}", v[0]);
        }
        for n in &v[..last] {
            res.push_str(format!("{:.4}", n).as_str());
            res.push_str(", ");
        }
        res.push_str(format!("{:.4}", &v[last]).as_str());
    }
    res
}

// Validation
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), ConformalError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(ConformalError::InvalidArgument(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Miscoverage levels must lie strictly inside `(0, 1)`.
pub fn validate_alpha(alpha: f64) -> Result<(), ConformalError> {
    if alpha.is_nan() || alpha <= 0.0 || alpha >= 1.0 {
        return Err(ConformalError::invalid_argument(
            "alpha",
            "real value strictly between 0 and 1",
            alpha,
        ));
    }
    Ok(())
}

/// Key used to store per-level calibration state.
pub fn alpha_key(alpha: f64) -> String {
    alpha.to_string()
}

/// Total order for finite floats, NaN sorts last.
#[inline]
pub fn float_cmp(a: &f64, b: &f64) -> Ordering {
    a.total_cmp(b)
}

/// Median of a sample, averaging the two middle values for even lengths.
pub fn median(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let mut sorted = v.to_vec();
    sorted.sort_unstable_by(float_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Solve the dense system `a * x = b` by Gaussian elimination with partial pivoting.
///
/// * `a` - Row-major `n x n` matrix, consumed.
/// * `b` - Right hand side of length `n`, consumed.
pub fn solve_linear_system(mut a: Vec<f64>, mut b: Vec<f64>, n: usize) -> Result<Vec<f64>, ConformalError> {
    if a.len() != n * n || b.len() != n {
        return Err(ConformalError::ShapeMismatch("linear system".to_string(), n * n, a.len()));
    }
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&r1, &r2| a[r1 * n + col].abs().total_cmp(&a[r2 * n + col].abs()))
            .unwrap_or(col);
        if a[pivot * n + col].abs() < PIVOT_TOLERANCE {
            return Err(ConformalError::InvalidConfiguration(
                "design matrix is singular, features are collinear or constant".to_string(),
            ));
        }
        if pivot != col {
            for k in 0..n {
                a.swap(col * n + k, pivot * n + k);
            }
            b.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = a[row * n + col] / a[col * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row * n + k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row * n + row];
    }
    Ok(x)
}
