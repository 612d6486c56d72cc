//! Exponential smoothing with a damped additive trend (Holt / Gardner)

use crate::{MathError, Result};

/// Damped-trend exponential smoothing state
#[derive(Debug, Clone, PartialEq)]
pub struct DampedHolt {
    alpha: f64,
    beta: f64,
    phi: f64,
    level: Option<f64>,
    trend: f64,
    values_seen: usize,
}

impl DampedHolt {
    /// Create a smoother with level `alpha`, trend `beta` and damping `phi`
    pub fn new(alpha: f64, beta: f64, phi: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(MathError::InvalidInput(
                "Alpha must be between 0 and 1 (exclusive)".to_string(),
            ));
        }
        if beta <= 0.0 || beta >= 1.0 {
            return Err(MathError::InvalidInput(
                "Beta must be between 0 and 1 (exclusive)".to_string(),
            ));
        }
        if phi <= 0.0 || phi > 1.0 {
            return Err(MathError::InvalidInput(
                "Phi must be in (0, 1]".to_string(),
            ));
        }

        Ok(Self {
            alpha,
            beta,
            phi,
            level: None,
            trend: 0.0,
            values_seen: 0,
        })
    }

    /// Feed one observation
    pub fn update(&mut self, value: f64) {
        match self.level {
            None => {
                self.level = Some(value);
            }
            Some(level) if self.values_seen == 1 => {
                self.trend = value - level;
                self.level = Some(value);
            }
            Some(level) => {
                let damped = self.phi * self.trend;
                let new_level = self.alpha * value + (1.0 - self.alpha) * (level + damped);
                self.trend = self.beta * (new_level - level) + (1.0 - self.beta) * damped;
                self.level = Some(new_level);
            }
        }
        self.values_seen += 1;
    }

    /// Forecast `h` steps ahead (h >= 1)
    pub fn forecast(&self, h: usize) -> Result<f64> {
        let level = self.level.ok_or_else(|| {
            MathError::InsufficientData("Smoother has not seen any data".to_string())
        })?;

        let mut damping = 0.0;
        let mut power = 1.0;
        for _ in 0..h {
            power *= self.phi;
            damping += power;
        }
        Ok(level + damping * self.trend)
    }

    /// Run the smoother over `values`, returning the final state together
    /// with the one-step-ahead residuals (from the third observation on)
    pub fn run(alpha: f64, beta: f64, phi: f64, values: &[f64]) -> Result<(Self, Vec<f64>)> {
        if values.len() < 3 {
            return Err(MathError::InsufficientData(
                "Damped trend smoothing needs at least 3 observations".to_string(),
            ));
        }

        let mut smoother = Self::new(alpha, beta, phi)?;
        let mut residuals = Vec::with_capacity(values.len() - 2);
        for (i, &value) in values.iter().enumerate() {
            if i >= 2 {
                residuals.push(value - smoother.forecast(1)?);
            }
            smoother.update(value);
        }
        Ok((smoother, residuals))
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }
}
