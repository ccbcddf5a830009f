use crate::errors::ConformalError;
use crate::utils::validate_float_parameter;

fn check_lengths(y: &[f64], yhat: &[f64]) -> Result<(), ConformalError> {
    if y.len() != yhat.len() {
        return Err(ConformalError::ShapeMismatch("yhat".to_string(), y.len(), yhat.len()));
    }
    if y.is_empty() {
        return Err(ConformalError::invalid_argument("y", "at least one outcome", "empty"));
    }
    Ok(())
}

/// Pinball loss of a residual `s = y - yhat` at level `tau`.
#[inline]
pub fn pinball(s: f64, tau: f64) -> f64 {
    if s >= 0.0 {
        tau * s
    } else {
        (tau - 1.0) * s
    }
}

/// Mean pinball loss of `yhat` as the `tau` quantile of `y`.
pub fn pinball_loss(y: &[f64], yhat: &[f64], tau: f64) -> Result<f64, ConformalError> {
    check_lengths(y, yhat)?;
    validate_float_parameter(tau, 0.0, 1.0, "tau")?;
    let res = y
        .iter()
        .zip(yhat)
        .map(|(y_, yhat_)| pinball(*y_ - *yhat_, tau))
        .sum::<f64>();
    Ok(res / y.len() as f64)
}

pub fn root_mean_squared_error(y: &[f64], yhat: &[f64]) -> Result<f64, ConformalError> {
    check_lengths(y, yhat)?;
    let res = y.iter().zip(yhat).map(|(y_, yhat_)| (y_ - yhat_).powi(2)).sum::<f64>();
    Ok((res / y.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinball() {
        assert_eq!(pinball(2.0, 0.9), 1.8);
        assert!((pinball(-2.0, 0.9) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_pinball_loss() {
        let y = vec![1.0, 2.0, 3.0];
        let yhat = vec![2.0, 2.0, 2.0];
        // under by 1 at tau 0.9 costs 0.9, over by 1 costs 0.1
        let loss = pinball_loss(&y, &yhat, 0.9).unwrap();
        assert!((loss - (0.1 + 0.0 + 0.9) / 3.0).abs() < 1e-12);
        assert_eq!(pinball_loss(&y, &y, 0.3).unwrap(), 0.0);
        assert!(pinball_loss(&y, &yhat, 1.5).is_err());
        assert!(matches!(
            pinball_loss(&y, &yhat[..2], 0.5),
            Err(ConformalError::ShapeMismatch(..))
        ));
    }

    #[test]
    fn test_root_mean_squared_error() {
        let y = vec![0.0, 0.0];
        let yhat = vec![3.0, -3.0];
        assert_eq!(root_mean_squared_error(&y, &yhat).unwrap(), 3.0);
        assert!(root_mean_squared_error(&[], &[]).is_err());
    }
}
