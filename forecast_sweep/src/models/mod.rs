//! Forecasters and the machinery to construct them per sweep cell

use crate::data::TimeSeries;
use crate::error::{Result, SweepError};
use std::fmt::Debug;

pub mod arima;
pub mod autoregressive;
pub mod factory;
pub mod params;
pub mod registry;
pub mod smoothing;
pub mod trees;
pub mod trend;

pub use factory::{ModelContext, ModelFactory};
pub use params::ModelParams;
pub use registry::{ModelEntry, ModelFamily, ModelRegistry, ParamSource};

/// A forecasting model driven by the backtest engine.
///
/// Models predict the close component of the series they are fitted on.
/// `fit` replaces any previously fitted state.
pub trait Forecaster: Debug + Send {
    /// Name of the model
    fn name(&self) -> &str;

    /// Fit the model on a training series
    fn fit(&mut self, series: &TimeSeries) -> Result<()>;

    /// Forecast `n` steps past the end of the training series
    fn predict(&self, n: usize) -> Result<Vec<f64>>;

    /// Forecast `n` steps past the end of `history` using the fitted
    /// parameters. Local models, which are tied to their training series,
    /// keep the default and must be retrained instead.
    fn predict_from(&self, history: &TimeSeries, n: usize) -> Result<Vec<f64>> {
        let _ = (history, n);
        Err(SweepError::ModelError(format!(
            "{} cannot forecast a new history without retraining",
            self.name()
        )))
    }
}

/// Options of a walk-forward historical forecast
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalForecastOptions {
    /// Index of the first point to forecast
    pub start: usize,
    pub forecast_horizon: usize,
    pub stride: usize,
    /// Refit the model before every forecast
    pub retrain: bool,
    /// Training window used when retraining; all history when `None`
    pub train_length: Option<usize>,
}

impl HistoricalForecastOptions {
    /// One-step-ahead forecasts of every point from `start` on
    pub fn one_step(start: usize) -> Self {
        Self {
            start,
            forecast_horizon: 1,
            stride: 1,
            retrain: false,
            train_length: None,
        }
    }

    pub fn with_retrain(mut self, retrain: bool, train_length: Option<usize>) -> Self {
        self.retrain = retrain;
        self.train_length = train_length;
        self
    }
}

/// Slide the forecast origin over `series` and collect the last point of
/// each forecast, stamped with the timestamp it predicts.
///
/// Without `retrain` the model must already be fitted and is only asked to
/// forecast from the growing history. With `retrain` it is refitted at every
/// origin on at most `train_length` trailing points.
pub fn historical_forecasts(
    model: &mut dyn Forecaster,
    series: &TimeSeries,
    options: &HistoricalForecastOptions,
) -> Result<TimeSeries> {
    let horizon = options.forecast_horizon;
    if horizon == 0 || options.stride == 0 {
        return Err(SweepError::InvalidParameter(
            "Forecast horizon and stride must be positive".to_string(),
        ));
    }
    if options.start == 0 || options.start + horizon > series.len() {
        return Err(SweepError::InvalidParameter(format!(
            "Start index {} leaves nothing to forecast in a series of length {}",
            options.start,
            series.len()
        )));
    }
    if options.train_length == Some(0) {
        return Err(SweepError::InvalidParameter(
            "Train length must be positive".to_string(),
        ));
    }

    let last_origin = series.len() - horizon;
    let mut timestamps = Vec::new();
    let mut values = Vec::new();

    for origin in (options.start..=last_origin).step_by(options.stride) {
        let forecast = if options.retrain {
            let window_start = options
                .train_length
                .map_or(0, |len| origin.saturating_sub(len));
            model.fit(&series.slice(window_start, origin)?)?;
            model.predict(horizon)?
        } else {
            model.predict_from(&series.slice(0, origin)?, horizon)?
        };

        let point = forecast.last().copied().ok_or_else(|| {
            SweepError::ModelError(format!("{} returned an empty forecast", model.name()))
        })?;
        timestamps.push(series.timestamps()[origin + horizon - 1]);
        values.push(point);
    }

    TimeSeries::univariate(series.close_column(), timestamps, values)
}
