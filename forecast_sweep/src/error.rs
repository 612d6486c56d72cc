//! Error types for the forecast_sweep crate

use forecast_math::MathError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the forecast_sweep crate
#[derive(Debug, Error)]
pub enum SweepError {
    /// The model identifier is not in the registry
    #[error("Model {0} is not supported")]
    UnsupportedModel(String),

    /// A fit or predict call failed while producing a period's forecasts
    #[error("Forecast failed for {model}/{asset}/{time_frame} period {period}")]
    ForecastFailure {
        model: String,
        asset: String,
        time_frame: String,
        period: usize,
        #[source]
        cause: Box<SweepError>,
    },

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error raised by a forecaster
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No tuned parameter set exists for a cell
    #[error("Hyperparameter error: {0}")]
    Hyperparameter(String),

    /// Configuration is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from numerical routines
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error while reading or writing CSV artifacts
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error while parsing JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, SweepError>;

impl From<PolarsError> for SweepError {
    fn from(err: PolarsError) -> Self {
        SweepError::PolarsError(err.to_string())
    }
}

impl SweepError {
    /// Wrap `cause` as the failure of one period of a sweep cell
    pub fn forecast_failure(
        model: &str,
        asset: &str,
        time_frame: &str,
        period: usize,
        cause: SweepError,
    ) -> Self {
        SweepError::ForecastFailure {
            model: model.to_string(),
            asset: asset.to_string(),
            time_frame: time_frame.to_string(),
            period,
            cause: Box::new(cause),
        }
    }

    /// The message followed by every underlying cause, colon separated
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// True when retrying another cell of the same model cannot succeed
    pub fn is_unsupported_model(&self) -> bool {
        match self {
            SweepError::UnsupportedModel(_) => true,
            SweepError::ForecastFailure { cause, .. } => cause.is_unsupported_model(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_forecast_failure_names_cause_once() {
        let err = SweepError::forecast_failure(
            "ARIMA",
            "BTC",
            "1h",
            2,
            SweepError::ModelError("singular matrix".to_string()),
        );
        assert_eq!(err.to_string(), "Forecast failed for ARIMA/BTC/1h period 2");
        assert_eq!(
            err.chain(),
            "Forecast failed for ARIMA/BTC/1h period 2: Model error: singular matrix"
        );

        let report = format!("{:#}", anyhow::Error::new(err));
        assert_eq!(report.matches("singular matrix").count(), 1);
    }

    #[test]
    fn test_unsupported_model_through_failure() {
        let err = SweepError::forecast_failure(
            "GPT",
            "BTC",
            "1h",
            0,
            SweepError::UnsupportedModel("GPT".to_string()),
        );
        assert!(err.is_unsupported_model());
        assert!(!SweepError::DataError("x".to_string()).is_unsupported_model());
    }
}
