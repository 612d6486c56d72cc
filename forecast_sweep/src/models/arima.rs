//! ARIMA models with automatic order selection

use crate::data::TimeSeries;
use crate::error::{Result, SweepError};
use crate::models::{Forecaster, ModelParams};
use forecast_math::differencing::{select_order, Differencer};
use forecast_math::lags::lag_matrix;
use forecast_math::linalg::{least_squares, predict_linear};
use forecast_math::{aic, mean};

/// Order search bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBounds {
    pub start_p: usize,
    pub max_p: usize,
    pub start_q: usize,
    pub max_q: usize,
    pub max_d: usize,
}

impl Default for OrderBounds {
    fn default() -> Self {
        Self {
            start_p: 0,
            max_p: 5,
            start_q: 0,
            max_q: 5,
            max_d: 5,
        }
    }
}

/// ARIMA(p, d, q) with the differencing order picked by variance reduction
/// and (p, q) picked by AIC over the bounds. ARMA coefficients are estimated
/// with the Hannan–Rissanen two-stage regression.
///
/// Seasonal bounds (`start_P`, `max_P`, ...) are accepted so tuned parameter
/// sets can be shared, but the search is non-seasonal.
#[derive(Debug, Clone)]
pub struct AutoArima {
    name: String,
    bounds: OrderBounds,
    fitted: Option<ArimaFit>,
}

#[derive(Debug, Clone)]
struct ArimaFit {
    p: usize,
    q: usize,
    /// Intercept first, then AR then MA coefficients
    coefficients: Vec<f64>,
    differencer: Differencer,
    /// Differenced training series
    history: Vec<f64>,
    residuals: Vec<f64>,
}

impl AutoArima {
    pub fn new(bounds: OrderBounds) -> Result<Self> {
        if bounds.start_p > bounds.max_p || bounds.start_q > bounds.max_q {
            return Err(SweepError::InvalidParameter(format!(
                "Invalid ARIMA bounds: p {}..={}, q {}..={}",
                bounds.start_p, bounds.max_p, bounds.start_q, bounds.max_q
            )));
        }
        Ok(Self {
            name: "AutoARIMA".to_string(),
            bounds,
            fitted: None,
        })
    }

    pub fn from_params(params: &ModelParams) -> Result<Self> {
        let defaults = OrderBounds::default();
        Self::new(OrderBounds {
            start_p: params.usize_or("start_p", defaults.start_p)?,
            max_p: params.usize_or("max_p", defaults.max_p)?,
            start_q: params.usize_or("start_q", defaults.start_q)?,
            max_q: params.usize_or("max_q", defaults.max_q)?,
            max_d: params.usize_or("max_d", defaults.max_d)?,
        })
    }

    /// Selected (p, d, q) after fitting
    pub fn order(&self) -> Option<(usize, usize, usize)> {
        self.fitted
            .as_ref()
            .map(|f| (f.p, f.differencer.order(), f.q))
    }

    fn fit_arma(z: &[f64], p: usize, q: usize) -> Option<(Vec<f64>, f64, usize)> {
        let n = z.len();

        // Stage one: a long autoregression supplies residual estimates
        let innovations = if q > 0 {
            let long = (p + q).max((n as f64).ln().ceil() as usize * 2).min(n / 3);
            if long == 0 {
                return None;
            }
            let (rows, targets) = lag_matrix(z, long).ok()?;
            let coef = least_squares(&rows, &targets, 0.0, true).ok()?;
            let mut resid = vec![0.0; n];
            for (i, row) in rows.iter().enumerate() {
                resid[i + long] = targets[i] - predict_linear(&coef, row, true);
            }
            Some((resid, long))
        } else {
            None
        };

        // Stage two: regress on lagged values and lagged innovations
        let first = p.max(innovations.as_ref().map_or(0, |(_, long)| long + q));
        let k = 1 + p + q;
        if n <= first + k + 2 {
            return None;
        }

        let mut rows = Vec::with_capacity(n - first);
        let mut targets = Vec::with_capacity(n - first);
        for t in first..n {
            let mut row = Vec::with_capacity(p + q);
            row.extend((1..=p).map(|lag| z[t - lag]));
            if let Some((resid, _)) = &innovations {
                row.extend((1..=q).map(|lag| resid[t - lag]));
            }
            rows.push(row);
            targets.push(z[t]);
        }

        let coefficients = least_squares(&rows, &targets, 0.0, true).ok()?;
        let sse: f64 = rows
            .iter()
            .zip(&targets)
            .map(|(row, y)| (y - predict_linear(&coefficients, row, true)).powi(2))
            .sum();
        let score = aic(sse, targets.len(), k).ok()?;
        Some((coefficients, score, targets.len()))
    }

    /// Residuals of the selected model over the whole differenced series
    fn filter_residuals(z: &[f64], p: usize, q: usize, coefficients: &[f64]) -> Vec<f64> {
        let mut resid = vec![0.0; z.len()];
        for t in 0..z.len() {
            if t < p.max(q) {
                continue;
            }
            let mut pred = coefficients[0];
            for lag in 1..=p {
                pred += coefficients[lag] * z[t - lag];
            }
            for lag in 1..=q {
                pred += coefficients[p + lag] * resid[t - lag];
            }
            resid[t] = z[t] - pred;
        }
        resid
    }
}

impl Forecaster for AutoArima {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.close_values();
        if values.len() < 8 {
            return Err(SweepError::ModelError(format!(
                "ARIMA needs at least 8 observations, got {}",
                values.len()
            )));
        }

        let d = select_order(values, self.bounds.max_d);
        let (differencer, z) = Differencer::fit(values, d)?;

        let mut best: Option<(usize, usize, Vec<f64>, f64)> = None;
        for p in self.bounds.start_p..=self.bounds.max_p {
            for q in self.bounds.start_q..=self.bounds.max_q {
                if let Some((coefficients, score, _)) = Self::fit_arma(&z, p, q) {
                    if best.as_ref().map_or(true, |(_, _, _, s)| score < *s) {
                        best = Some((p, q, coefficients, score));
                    }
                }
            }
        }

        let (p, q, coefficients) = match best {
            Some((p, q, coefficients, _)) => (p, q, coefficients),
            // Too little data for any ARMA term: fall back to the mean
            None => (0, 0, vec![mean(&z).unwrap_or(0.0)]),
        };

        let residuals = Self::filter_residuals(&z, p, q, &coefficients);
        self.name = format!("ARIMA({},{},{})", p, d, q);
        self.fitted = Some(ArimaFit {
            p,
            q,
            coefficients,
            differencer,
            history: z,
            residuals,
        });
        Ok(())
    }

    fn predict(&self, n: usize) -> Result<Vec<f64>> {
        let fit = self.fitted.as_ref().ok_or_else(|| {
            SweepError::ModelError("Model has not been fitted to data".to_string())
        })?;

        let mut history = fit.history.clone();
        let mut residuals = fit.residuals.clone();
        let mut forecasts = Vec::with_capacity(n);

        for _ in 0..n {
            let t = history.len();
            let mut value = fit.coefficients[0];
            for lag in 1..=fit.p {
                value += fit.coefficients[lag] * history.get(t.wrapping_sub(lag)).copied().unwrap_or(0.0);
            }
            for lag in 1..=fit.q {
                value += fit.coefficients[fit.p + lag] * residuals.get(t.wrapping_sub(lag)).copied().unwrap_or(0.0);
            }
            history.push(value);
            // Future innovations have zero expectation
            residuals.push(0.0);
            forecasts.push(value);
        }

        Ok(fit.differencer.integrate(&forecasts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: Vec<f64>) -> TimeSeries {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..values.len()).map(|i| start + Duration::hours(i as i64)).collect();
        TimeSeries::univariate("close", timestamps, values).unwrap()
    }

    #[test]
    fn test_linear_trend_is_extrapolated() {
        let values: Vec<f64> = (0..80).map(|i| 50.0 + 0.5 * i as f64).collect();
        let mut model = AutoArima::new(OrderBounds::default()).unwrap();
        model.fit(&series(values)).unwrap();

        let (_, d, _) = model.order().unwrap();
        assert!(d >= 1);
        let forecast = model.predict(2).unwrap();
        assert_abs_diff_eq!(forecast[0], 90.0, epsilon = 1e-6);
        assert_abs_diff_eq!(forecast[1], 90.5, epsilon = 1e-6);
    }

    #[test]
    fn test_ar1_process_is_recovered() {
        let mut values = vec![10.0];
        // Deterministic AR(1) with a small periodic disturbance
        for i in 1..200 {
            let shock = ((i * 7919) % 13) as f64 / 13.0 - 0.5;
            values.push(0.6 * values[i - 1] + 4.0 + shock);
        }
        let mut model = AutoArima::from_params(&ModelParams::new().with("max_d", 0)).unwrap();
        model.fit(&series(values.clone())).unwrap();
        let next = model.predict(1).unwrap()[0];
        let expected = 0.6 * values[199] + 4.0;
        assert!((next - expected).abs() < 1.0, "{} vs {}", next, expected);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = AutoArima::new(OrderBounds::default()).unwrap();
        assert!(model.predict(1).is_err());
    }

    #[test]
    fn test_too_short_series() {
        let mut model = AutoArima::new(OrderBounds::default()).unwrap();
        assert!(model.fit(&series(vec![1.0, 2.0, 3.0])).is_err());
    }

    #[test]
    fn test_invalid_bounds() {
        let params = ModelParams::new().with("start_p", 3).with("max_p", 1);
        assert!(AutoArima::from_params(&params).is_err());
    }

    #[test]
    fn test_is_local_model() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let mut model = AutoArima::new(OrderBounds::default()).unwrap();
        model.fit(&series(values.clone())).unwrap();
        assert!(model.predict_from(&series(values), 1).is_err());
    }
}
