//! # Forecast Math
//!
//! Numerical building blocks for the native forecasters used by
//! `forecast_sweep`: least-squares solves, differencing, exponential
//! smoothing, lag design matrices and regression trees.

use thiserror::Error;

pub mod differencing;
pub mod lags;
pub mod linalg;
pub mod smoothing;
pub mod tree;

/// Errors that can occur in numerical routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Akaike information criterion for a Gaussian model with `k` parameters.
///
/// Uses the concentrated likelihood form `n * ln(sse / n) + 2k`.
pub fn aic(sse: f64, n: usize, k: usize) -> Result<f64> {
    if n == 0 {
        return Err(MathError::InsufficientData(
            "AIC needs at least one residual".to_string(),
        ));
    }
    let sigma2 = (sse / n as f64).max(f64::MIN_POSITIVE);
    Ok(n as f64 * sigma2.ln() + 2.0 * k as f64)
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population variance, `None` for an empty slice
pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}
