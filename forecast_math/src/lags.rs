//! Lagged design matrices for autoregressive regressors

use crate::{MathError, Result};

/// Build a supervised dataset from `values` using `lags` past observations.
///
/// Row `i` predicts `values[lags + i]` from the preceding `lags` values,
/// most recent first.
pub fn lag_matrix(values: &[f64], lags: usize) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
    if lags == 0 {
        return Err(MathError::InvalidInput("Lags must be positive".to_string()));
    }
    if values.len() <= lags {
        return Err(MathError::InsufficientData(format!(
            "Need more than {} observations to build {} lags",
            lags, lags
        )));
    }

    let rows = (lags..values.len())
        .map(|t| lag_features(&values[..t], lags))
        .collect::<Result<Vec<_>>>()?;
    let targets = values[lags..].to_vec();
    Ok((rows, targets))
}

/// The last `lags` values of `history`, most recent first
pub fn lag_features(history: &[f64], lags: usize) -> Result<Vec<f64>> {
    if history.len() < lags {
        return Err(MathError::InsufficientData(format!(
            "History of {} values is shorter than {} lags",
            history.len(),
            lags
        )));
    }
    Ok(history.iter().rev().take(lags).copied().collect())
}
