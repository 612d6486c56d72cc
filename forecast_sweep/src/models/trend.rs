//! Piecewise-linear trend regression with automatic changepoints

use crate::data::TimeSeries;
use crate::error::{Result, SweepError};
use crate::models::{Forecaster, ModelParams};
use forecast_math::linalg::{least_squares, predict_linear};

/// Linear trend whose slope may change at evenly spaced changepoints in the
/// first `changepoint_range` of the history. Slope changes are shrunk with a
/// ridge penalty of `1 / changepoint_prior_scale`.
#[derive(Debug, Clone)]
pub struct TrendRegression {
    name: String,
    n_changepoints: usize,
    changepoint_range: f64,
    changepoint_prior_scale: f64,
    fitted: Option<TrendFit>,
}

#[derive(Debug, Clone)]
struct TrendFit {
    /// Changepoint positions on the scaled time axis
    changepoints: Vec<f64>,
    coefficients: Vec<f64>,
    /// Index distance between consecutive observations on the scaled axis
    step: f64,
    /// Scaled time of the last training point
    last_t: f64,
    y_scale: f64,
}

impl TrendRegression {
    pub fn new(n_changepoints: usize, changepoint_range: f64, changepoint_prior_scale: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&changepoint_range) {
            return Err(SweepError::InvalidParameter(
                "changepoint_range must be within [0, 1]".to_string(),
            ));
        }
        if changepoint_prior_scale <= 0.0 {
            return Err(SweepError::InvalidParameter(
                "changepoint_prior_scale must be positive".to_string(),
            ));
        }
        Ok(Self {
            name: "TrendRegression".to_string(),
            n_changepoints,
            changepoint_range,
            changepoint_prior_scale,
            fitted: None,
        })
    }

    pub fn from_params(params: &ModelParams) -> Result<Self> {
        Self::new(
            params.usize_or("n_changepoints", 25)?,
            params.f64_or("changepoint_range", 0.8)?,
            params.f64_or("changepoint_prior_scale", 0.05)?,
        )
    }

    fn features(t: f64, changepoints: &[f64]) -> Vec<f64> {
        let mut row = Vec::with_capacity(changepoints.len() + 1);
        row.push(t);
        row.extend(changepoints.iter().map(|&c| (t - c).max(0.0)));
        row
    }
}

impl Forecaster for TrendRegression {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.close_values();
        let n = values.len();
        if n < 3 {
            return Err(SweepError::ModelError(
                "Trend regression needs at least 3 observations".to_string(),
            ));
        }

        let step = 1.0 / (n - 1) as f64;
        let usable = ((n as f64 * self.changepoint_range).floor() as usize).saturating_sub(1);
        let count = self.n_changepoints.min(usable);
        let changepoints: Vec<f64> = (1..=count)
            .map(|k| (k * usable / (count + 1)) as f64 * step)
            .collect();

        let y_scale = values
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
            .max(f64::EPSILON);
        let targets: Vec<f64> = values.iter().map(|v| v / y_scale).collect();
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| Self::features(i as f64 * step, &changepoints))
            .collect();

        let ridge = 1.0 / self.changepoint_prior_scale / n as f64;
        let coefficients = least_squares(&rows, &targets, ridge, true)?;

        self.fitted = Some(TrendFit {
            changepoints,
            coefficients,
            step,
            last_t: 1.0,
            y_scale,
        });
        Ok(())
    }

    fn predict(&self, n: usize) -> Result<Vec<f64>> {
        let fit = self.fitted.as_ref().ok_or_else(|| {
            SweepError::ModelError("Model has not been fitted to data".to_string())
        })?;

        Ok((1..=n)
            .map(|h| {
                let t = fit.last_t + h as f64 * fit.step;
                predict_linear(&fit.coefficients, &Self::features(t, &fit.changepoints), true) * fit.y_scale
            })
            .collect())
    }
}
