//! Exponential smoothing models for time series forecasting

use crate::data::TimeSeries;
use crate::error::{Result, SweepError};
use crate::models::{Forecaster, ModelParams};
use forecast_math::smoothing::DampedHolt;
use rayon::prelude::*;

const ALPHAS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
const BETAS: [f64; 5] = [0.01, 0.05, 0.1, 0.2, 0.3];
const PHIS: [f64; 4] = [0.8, 0.9, 0.98, 1.0];

/// Damped-trend exponential smoothing with a grid search over the smoothing
/// constants, optionally correcting forecasts with an AR(1) model of the
/// one-step residuals.
#[derive(Debug, Clone)]
pub struct DampedTrendSmoothing {
    name: String,
    use_arma_errors: bool,
    /// Worker threads for the grid search
    n_jobs: usize,
    fitted: Option<SmoothingFit>,
}

#[derive(Debug, Clone)]
struct SmoothingFit {
    smoother: DampedHolt,
    /// AR(1) coefficient and last residual, when ARMA errors are modelled
    residual_ar: Option<(f64, f64)>,
}

impl DampedTrendSmoothing {
    pub fn new(use_arma_errors: bool, n_jobs: usize) -> Result<Self> {
        if n_jobs == 0 {
            return Err(SweepError::InvalidParameter(
                "n_jobs must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            name: "DampedTrendSmoothing".to_string(),
            use_arma_errors,
            n_jobs,
            fitted: None,
        })
    }

    pub fn from_params(params: &ModelParams) -> Result<Self> {
        Self::new(
            params.bool_or("use_arma_errors", false)?,
            params.usize_or("n_jobs", 1)?,
        )
    }

    /// Chosen (alpha, beta, phi) after fitting
    pub fn smoothing_parameters(&self) -> Option<(f64, f64, f64)> {
        self.fitted
            .as_ref()
            .map(|f| (f.smoother.alpha(), f.smoother.beta(), f.smoother.phi()))
    }

    fn search(values: &[f64], alphas: &[f64]) -> Option<(f64, f64, f64, f64)> {
        let mut best: Option<(f64, f64, f64, f64)> = None;
        for &alpha in alphas {
            for beta in BETAS {
                for phi in PHIS {
                    let Ok((_, residuals)) = DampedHolt::run(alpha, beta, phi, values) else {
                        continue;
                    };
                    let sse: f64 = residuals.iter().map(|r| r * r).sum();
                    if best.map_or(true, |(_, _, _, b)| sse < b) {
                        best = Some((alpha, beta, phi, sse));
                    }
                }
            }
        }
        best
    }
}

impl Forecaster for DampedTrendSmoothing {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.close_values();
        if values.len() < 4 {
            return Err(SweepError::ModelError(
                "Exponential smoothing needs at least 4 observations".to_string(),
            ));
        }

        let candidates: Vec<(f64, f64, f64, f64)> = if self.n_jobs == 1 {
            Self::search(values, &ALPHAS).into_iter().collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.n_jobs)
                .build()
                .map_err(|e| SweepError::ModelError(format!("Grid search pool: {}", e)))?;
            pool.install(|| {
                ALPHAS
                    .par_iter()
                    .filter_map(|alpha| Self::search(values, std::slice::from_ref(alpha)))
                    .collect()
            })
        };

        // Candidates come back in alpha order, so ties resolve to the earliest alpha
        let (alpha, beta, phi, _) = candidates
            .into_iter()
            .reduce(|best, next| if next.3 < best.3 { next } else { best })
            .ok_or_else(|| SweepError::ModelError("Smoothing grid search failed".to_string()))?;

        let (smoother, residuals) = DampedHolt::run(alpha, beta, phi, values)?;

        let residual_ar = if self.use_arma_errors && residuals.len() > 2 {
            let num: f64 = residuals.windows(2).map(|w| w[0] * w[1]).sum();
            let den: f64 = residuals[..residuals.len() - 1].iter().map(|r| r * r).sum();
            let rho = if den > 0.0 { (num / den).clamp(-0.99, 0.99) } else { 0.0 };
            residuals.last().map(|&last| (rho, last))
        } else {
            None
        };

        self.fitted = Some(SmoothingFit {
            smoother,
            residual_ar,
        });
        Ok(())
    }

    fn predict(&self, n: usize) -> Result<Vec<f64>> {
        let fit = self.fitted.as_ref().ok_or_else(|| {
            SweepError::ModelError("Model has not been fitted to data".to_string())
        })?;

        (1..=n)
            .map(|h| {
                let base = fit.smoother.forecast(h)?;
                let correction = fit
                    .residual_ar
                    .map_or(0.0, |(rho, last)| rho.powi(h as i32) * last);
                Ok(base + correction)
            })
            .collect()
    }
}
