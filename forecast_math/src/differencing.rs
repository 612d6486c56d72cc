//! Differencing and its inverse for integrated (the "I" in ARIMA) models

use crate::{variance, MathError, Result};

/// Apply `d` rounds of first differencing
pub fn difference(values: &[f64], d: usize) -> Result<Vec<f64>> {
    if values.len() <= d {
        return Err(MathError::InsufficientData(format!(
            "Cannot difference {} values {} times",
            values.len(),
            d
        )));
    }

    let mut current = values.to_vec();
    for _ in 0..d {
        current = current.windows(2).map(|w| w[1] - w[0]).collect();
    }
    Ok(current)
}

/// Pick the differencing order in `0..=max_d` with the smallest variance.
///
/// Stops at the first order whose variance does not improve on the previous
/// one, which guards against over-differencing.
pub fn select_order(values: &[f64], max_d: usize) -> usize {
    let mut best_d = 0;
    let mut best_var = match variance(values) {
        Some(v) => v,
        None => return 0,
    };

    for d in 1..=max_d {
        // Keep a few points for the ARMA stage
        if values.len() < d + 3 {
            break;
        }
        let Ok(diffed) = difference(values, d) else {
            break;
        };
        match variance(&diffed) {
            Some(v) if v < best_var => {
                best_var = v;
                best_d = d;
            }
            _ => break,
        }
    }

    best_d
}

/// Remembers the trailing level at every differencing stage so that
/// forecasts made on the differenced scale can be integrated back.
#[derive(Debug, Clone, PartialEq)]
pub struct Differencer {
    order: usize,
    /// `tails[k]` is the last value of the series differenced `k` times
    tails: Vec<f64>,
}

impl Differencer {
    /// Difference `values` `order` times, returning the helper and the
    /// differenced series
    pub fn fit(values: &[f64], order: usize) -> Result<(Self, Vec<f64>)> {
        if values.len() <= order {
            return Err(MathError::InsufficientData(format!(
                "Cannot difference {} values {} times",
                values.len(),
                order
            )));
        }

        let mut tails = Vec::with_capacity(order);
        let mut current = values.to_vec();
        for _ in 0..order {
            tails.push(*current.last().unwrap_or(&0.0));
            current = current.windows(2).map(|w| w[1] - w[0]).collect();
        }

        Ok((Self { order, tails }, current))
    }

    /// The differencing order
    pub fn order(&self) -> usize {
        self.order
    }

    /// Integrate consecutive forecasts on the differenced scale back to levels
    pub fn integrate(&self, forecasts: &[f64]) -> Vec<f64> {
        let mut current = forecasts.to_vec();
        for level in (0..self.order).rev() {
            let mut acc = self.tails[level];
            for value in current.iter_mut() {
                acc += *value;
                *value = acc;
            }
        }
        current
    }
}
