//! Ridge autoregression over an input chunk, filling the neural model slots

use crate::data::TimeSeries;
use crate::error::{Result, SweepError};
use crate::models::{Forecaster, ModelParams};
use forecast_math::lags::{lag_features, lag_matrix};
use forecast_math::linalg::{least_squares, predict_linear};
use forecast_math::{mean, variance};

/// Recurrent cell flavour requested through the `model` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrentCell {
    Vanilla,
    Lstm,
    Gru,
}

impl RecurrentCell {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "RNN" => Ok(RecurrentCell::Vanilla),
            "LSTM" => Ok(RecurrentCell::Lstm),
            "GRU" => Ok(RecurrentCell::Gru),
            other => Err(SweepError::InvalidParameter(format!(
                "Unknown recurrent cell '{}'",
                other
            ))),
        }
    }
}

/// A global model: standardised lag windows of length `input_chunk_length`
/// regressed on the next value with an L2 penalty of `weight_decay`.
///
/// Recurrent cells additionally feed an exponentially weighted summary of
/// the window, with a longer memory for gated cells.
#[derive(Debug, Clone)]
pub struct LinearAutoregressor {
    name: String,
    input_chunk_length: usize,
    weight_decay: f64,
    cell: Option<RecurrentCell>,
    fitted: Option<AutoregressiveFit>,
}

#[derive(Debug, Clone)]
struct AutoregressiveFit {
    coefficients: Vec<f64>,
    center: f64,
    scale: f64,
    /// Standardised tail of the training series
    tail: Vec<f64>,
}

impl LinearAutoregressor {
    pub fn new(name: &str, input_chunk_length: usize, weight_decay: f64, cell: Option<RecurrentCell>) -> Result<Self> {
        if input_chunk_length == 0 {
            return Err(SweepError::InvalidParameter(
                "input_chunk_length must be positive".to_string(),
            ));
        }
        if weight_decay < 0.0 {
            return Err(SweepError::InvalidParameter(
                "weight_decay must be non-negative".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            input_chunk_length,
            weight_decay,
            cell,
            fitted: None,
        })
    }

    /// Build from a tuned parameter set. `model_name` tags the instance and
    /// `model` selects the recurrent cell.
    pub fn from_params(params: &ModelParams) -> Result<Self> {
        let cell = match params.get("model") {
            Some(_) => Some(RecurrentCell::parse(params.str_or("model", "RNN")?)?),
            None => None,
        };
        Self::new(
            params.str_or("model_name", "LinearAutoregressor")?,
            params.usize_or("input_chunk_length", 24)?,
            params.f64_or("weight_decay", 1e-3)?,
            cell,
        )
    }

    pub fn input_chunk_length(&self) -> usize {
        self.input_chunk_length
    }

    pub fn cell(&self) -> Option<RecurrentCell> {
        self.cell
    }

    fn memory(&self) -> Option<f64> {
        match self.cell? {
            RecurrentCell::Vanilla => Some(0.5),
            RecurrentCell::Lstm => Some(0.9),
            RecurrentCell::Gru => Some(0.8),
        }
    }

    fn features(&self, window: &[f64]) -> Result<Vec<f64>> {
        let mut row = lag_features(window, self.input_chunk_length)?;
        if let Some(decay) = self.memory() {
            // Lags come most recent first
            let (weighted, total) = row
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(acc, norm), (i, v)| {
                    let w = decay.powi(i as i32);
                    (acc + w * v, norm + w)
                });
            row.push(weighted / total);
        }
        Ok(row)
    }

    fn recursive(&self, fit: &AutoregressiveFit, history: &[f64], n: usize) -> Result<Vec<f64>> {
        let mut window = history[history.len().saturating_sub(self.input_chunk_length)..].to_vec();
        let mut forecasts = Vec::with_capacity(n);
        for _ in 0..n {
            let value = predict_linear(&fit.coefficients, &self.features(&window)?, true);
            window.remove(0);
            window.push(value);
            forecasts.push(value * fit.scale + fit.center);
        }
        Ok(forecasts)
    }
}

impl Forecaster for LinearAutoregressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.close_values();
        let center = mean(values).ok_or_else(|| {
            SweepError::ModelError("Cannot fit on an empty series".to_string())
        })?;
        let scale = variance(values)
            .map(f64::sqrt)
            .filter(|s| *s > f64::EPSILON)
            .unwrap_or(1.0);
        let standardised: Vec<f64> = values.iter().map(|v| (v - center) / scale).collect();

        let (lags, targets) = lag_matrix(&standardised, self.input_chunk_length)?;
        let rows = lags
            .iter()
            .map(|row| {
                // lag_matrix rows are already most recent first; rebuild the window
                let window: Vec<f64> = row.iter().rev().copied().collect();
                self.features(&window)
            })
            .collect::<Result<Vec<_>>>()?;

        let coefficients = least_squares(&rows, &targets, self.weight_decay, true)?;
        let tail = standardised[standardised.len() - self.input_chunk_length..].to_vec();
        self.fitted = Some(AutoregressiveFit {
            coefficients,
            center,
            scale,
            tail,
        });
        Ok(())
    }

    fn predict(&self, n: usize) -> Result<Vec<f64>> {
        let fit = self.fitted.as_ref().ok_or_else(|| {
            SweepError::ModelError("Model has not been fitted to data".to_string())
        })?;
        self.recursive(fit, &fit.tail, n)
    }

    fn predict_from(&self, history: &TimeSeries, n: usize) -> Result<Vec<f64>> {
        let fit = self.fitted.as_ref().ok_or_else(|| {
            SweepError::ModelError("Model has not been fitted to data".to_string())
        })?;
        let values = history.close_values();
        if values.len() < self.input_chunk_length {
            return Err(SweepError::ModelError(format!(
                "{} needs {} points of history, got {}",
                self.name,
                self.input_chunk_length,
                values.len()
            )));
        }
        let standardised: Vec<f64> = values.iter().map(|v| (v - fit.center) / fit.scale).collect();
        self.recursive(fit, &standardised, n)
    }
}
