//! Tree ensembles over lagged values (random forest and gradient boosting)

use crate::data::TimeSeries;
use crate::error::{Result, SweepError};
use crate::models::{Forecaster, ModelParams};
use forecast_math::lags::{lag_features, lag_matrix};
use forecast_math::tree::{EnsembleKind, TreeEnsemble, TreeParams};

/// A global regression model: once fitted it can forecast any history that
/// provides at least `lags` points.
#[derive(Debug, Clone)]
pub struct LagTreeModel {
    name: String,
    lags: usize,
    kind: EnsembleKind,
    n_estimators: usize,
    tree: TreeParams,
    random_state: u64,
    fitted: Option<(TreeEnsemble, Vec<f64>)>,
}

impl LagTreeModel {
    pub fn new(
        name: &str,
        lags: usize,
        kind: EnsembleKind,
        n_estimators: usize,
        tree: TreeParams,
        random_state: u64,
    ) -> Result<Self> {
        if lags == 0 {
            return Err(SweepError::InvalidParameter("lags must be positive".to_string()));
        }
        if n_estimators == 0 {
            return Err(SweepError::InvalidParameter(
                "n_estimators must be positive".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            lags,
            kind,
            n_estimators,
            tree,
            random_state,
            fitted: None,
        })
    }

    /// Bagged trees, parameterised like a random forest regressor
    pub fn random_forest(params: &ModelParams) -> Result<Self> {
        Self::new(
            "RandomForest",
            params.usize_or("lags", 12)?,
            EnsembleKind::Bagging,
            params.usize_or("n_estimators", 100)?,
            TreeParams {
                max_depth: params.usize_or("max_depth", 8)?,
                min_samples_leaf: params.usize_or("min_samples_leaf", 1)?,
            },
            params.u64_or("random_state", 0)?,
        )
    }

    /// Boosted trees; `default_learning_rate` differs between boosting libraries
    pub fn boosted(name: &str, params: &ModelParams, default_learning_rate: f64) -> Result<Self> {
        Self::new(
            name,
            params.usize_or("lags", 12)?,
            EnsembleKind::Boosting {
                learning_rate: params.f64_or("learning_rate", default_learning_rate)?,
            },
            params.usize_or("n_estimators", 100)?,
            TreeParams {
                max_depth: params.usize_or("max_depth", 6)?,
                min_samples_leaf: params.usize_or("min_samples_leaf", 1)?,
            },
            params.u64_or("random_state", 0)?,
        )
    }

    pub fn lags(&self) -> usize {
        self.lags
    }

    fn recursive(&self, ensemble: &TreeEnsemble, history: &[f64], n: usize) -> Result<Vec<f64>> {
        let mut window = history[history.len().saturating_sub(self.lags)..].to_vec();
        let mut forecasts = Vec::with_capacity(n);
        for _ in 0..n {
            let features = lag_features(&window, self.lags)?;
            let value = ensemble.predict(&features);
            window.remove(0);
            window.push(value);
            forecasts.push(value);
        }
        Ok(forecasts)
    }
}

impl Forecaster for LagTreeModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.close_values();
        let (rows, targets) = lag_matrix(values, self.lags)?;
        let ensemble = TreeEnsemble::fit(
            &rows,
            &targets,
            self.kind,
            self.n_estimators,
            self.tree,
            self.random_state,
        )?;
        let tail = values[values.len() - self.lags..].to_vec();
        self.fitted = Some((ensemble, tail));
        Ok(())
    }

    fn predict(&self, n: usize) -> Result<Vec<f64>> {
        let (ensemble, tail) = self.fitted.as_ref().ok_or_else(|| {
            SweepError::ModelError("Model has not been fitted to data".to_string())
        })?;
        self.recursive(ensemble, tail, n)
    }

    fn predict_from(&self, history: &TimeSeries, n: usize) -> Result<Vec<f64>> {
        let (ensemble, _) = self.fitted.as_ref().ok_or_else(|| {
            SweepError::ModelError("Model has not been fitted to data".to_string())
        })?;
        let values = history.close_values();
        if values.len() < self.lags {
            return Err(SweepError::ModelError(format!(
                "{} needs {} points of history, got {}",
                self.name,
                self.lags,
                values.len()
            )));
        }
        self.recursive(ensemble, values, n)
    }
}
