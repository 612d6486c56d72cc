//! Metrics for evaluating persisted forecasts

use crate::artifacts::{ArtifactRole, ArtifactStore, OutputKind};
use crate::data::TimeSeries;
use crate::error::{Result, SweepError};
use crate::models::ModelContext;
use std::collections::HashMap;
use std::fmt;

/// Forecast performance metrics
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
    /// Direction accuracy percentage
    pub direction_accuracy: f64,
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  MAE:       {:.4}", self.mae)?;
        writeln!(f, "  MSE:       {:.4}", self.mse)?;
        writeln!(f, "  RMSE:      {:.4}", self.rmse)?;
        writeln!(f, "  MAPE:      {:.4}%", self.mape)?;
        writeln!(f, "  SMAPE:     {:.4}%", self.smape)?;
        write!(f, "  Direction: {:.2}%", self.direction_accuracy)
    }
}

/// Evaluate forecast accuracy against actual values
pub fn evaluate_forecast(forecast: &[f64], actual: &[f64]) -> Result<ForecastMetrics> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(SweepError::InvalidParameter(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;
    let errors: Vec<f64> = forecast.iter().zip(actual).map(|(&f, &a)| a - f).collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    let mape = actual
        .iter()
        .zip(&errors)
        .filter(|(&a, _)| a != 0.0)
        .map(|(&a, &e)| e.abs() / a.abs() * 100.0)
        .sum::<f64>()
        / n;

    let smape = actual
        .iter()
        .zip(forecast)
        .map(|(&a, &f)| {
            let denominator = a.abs() + f.abs();
            if denominator == 0.0 {
                0.0
            } else {
                200.0 * (a - f).abs() / denominator
            }
        })
        .sum::<f64>()
        / n;

    // Moves where both series actually changed
    let moves: Vec<bool> = forecast
        .windows(2)
        .zip(actual.windows(2))
        .filter(|(f, a)| (f[1] - f[0]).abs() > 1e-10 && (a[1] - a[0]).abs() > 1e-10)
        .map(|(f, a)| (f[1] > f[0]) == (a[1] > a[0]))
        .collect();
    let direction_accuracy = if moves.is_empty() {
        0.0
    } else {
        moves.iter().filter(|&&hit| hit).count() as f64 / moves.len() as f64 * 100.0
    };

    Ok(ForecastMetrics {
        mae,
        mse,
        rmse,
        mape,
        smape,
        direction_accuracy,
    })
}

/// Metrics of one period of a cell
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodMetrics {
    pub period: usize,
    /// Rows present in both the prediction and test files
    pub aligned: usize,
    pub metrics: ForecastMetrics,
}

/// Pair predictions with the test values observed at the same timestamps
pub fn align(prediction: &TimeSeries, test: &TimeSeries) -> Result<(Vec<f64>, Vec<f64>)> {
    let column = prediction.close_column();
    let actual = test.column(column).ok_or_else(|| {
        SweepError::DataError(format!("Test segment has no '{}' component", column))
    })?;
    let by_time: HashMap<_, f64> = test.timestamps().iter().copied().zip(actual.iter().copied()).collect();

    Ok(prediction
        .timestamps()
        .iter()
        .zip(prediction.close_values())
        .filter_map(|(ts, &f)| by_time.get(ts).map(|&a| (f, a)))
        .unzip())
}

/// Evaluate every period of a persisted cell
pub fn evaluate_cell(
    store: &ArtifactStore,
    kind: OutputKind,
    context: &ModelContext,
    n_periods: usize,
) -> Result<Vec<PeriodMetrics>> {
    (0..n_periods)
        .map(|period| {
            let prediction = store.read_artifact(kind, context, ArtifactRole::Pred, period)?;
            let test = store.read_artifact(kind, context, ArtifactRole::Test, period)?;
            let (forecast, actual) = align(&prediction, &test)?;
            Ok(PeriodMetrics {
                period,
                aligned: forecast.len(),
                metrics: evaluate_forecast(&forecast, &actual)?,
            })
        })
        .collect()
}
