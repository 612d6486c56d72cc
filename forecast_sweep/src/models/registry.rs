//! Model identifier to constructor mapping

use crate::error::{Result, SweepError};
use crate::models::arima::AutoArima;
use crate::models::autoregressive::LinearAutoregressor;
use crate::models::smoothing::DampedTrendSmoothing;
use crate::models::trees::LagTreeModel;
use crate::models::trend::TrendRegression;
use crate::models::{Forecaster, ModelParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Broad model families, used for reporting and default policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Statistical,
    Tree,
    Neural,
}

/// Where a model's constructor parameters come from
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSource {
    /// The same parameters for every cell
    Fixed(ModelParams),
    /// Tuned parameters looked up per (model, asset, time frame)
    Tuned {
        /// Pass the model identifier as `model_name`
        tag_model_name: bool,
        /// Added on top of the tuned set
        extra: ModelParams,
    },
}

impl ParamSource {
    pub fn tuned() -> Self {
        ParamSource::Tuned {
            tag_model_name: false,
            extra: ModelParams::new(),
        }
    }

    /// Tuned parameters tagged with the model identifier
    pub fn tagged(extra: ModelParams) -> Self {
        ParamSource::Tuned {
            tag_model_name: true,
            extra,
        }
    }
}

type BuildFn = dyn Fn(&ModelParams) -> Result<Box<dyn Forecaster>> + Send + Sync;

/// Everything the sweep needs to know about one model identifier
#[derive(Clone)]
pub struct ModelEntry {
    pub family: ModelFamily,
    /// Refit at every forecast step instead of once per period
    pub requires_retrain: bool,
    pub params: ParamSource,
    build: Arc<BuildFn>,
}

impl ModelEntry {
    pub fn new<F>(family: ModelFamily, requires_retrain: bool, params: ParamSource, build: F) -> Self
    where
        F: Fn(&ModelParams) -> Result<Box<dyn Forecaster>> + Send + Sync + 'static,
    {
        Self {
            family,
            requires_retrain,
            params,
            build: Arc::new(build),
        }
    }

    /// Construct a fresh, unfit forecaster from resolved parameters
    pub fn build(&self, params: &ModelParams) -> Result<Box<dyn Forecaster>> {
        (self.build)(params)
    }
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("family", &self.family)
            .field("requires_retrain", &self.requires_retrain)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Registered model identifiers. New families register independently.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: BTreeMap<String, ModelEntry>,
}

impl ModelRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a model identifier
    pub fn register(&mut self, model: &str, entry: ModelEntry) -> &mut Self {
        self.entries.insert(model.to_string(), entry);
        self
    }

    pub fn with(mut self, model: &str, entry: ModelEntry) -> Self {
        self.register(model, entry);
        self
    }

    pub fn get(&self, model: &str) -> Result<&ModelEntry> {
        self.entries
            .get(model)
            .ok_or_else(|| SweepError::UnsupportedModel(model.to_string()))
    }

    pub fn contains(&self, model: &str) -> bool {
        self.entries.contains_key(model)
    }

    /// Whether `model` is refit at every forecast step
    pub fn requires_retrain(&self, model: &str) -> Result<bool> {
        self.get(model).map(|entry| entry.requires_retrain)
    }

    /// Registered identifiers in lexical order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The standard catalog: statistical models with fixed search bounds
    /// and per-step retraining, tree and neural models with tuned parameters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        let arima_bounds = ["start_p", "start_q", "start_P", "start_Q"]
            .into_iter()
            .fold(ModelParams::new(), |params, key| params.with(key, 0))
            .with("max_p", 5)
            .with("max_d", 5)
            .with("max_q", 5)
            .with("max_P", 5)
            .with("max_Q", 5);
        registry.register(
            "ARIMA",
            ModelEntry::new(ModelFamily::Statistical, true, ParamSource::Fixed(arima_bounds), |p| {
                Ok(Box::new(AutoArima::from_params(p)?))
            }),
        );

        // Single threaded: the sweep itself is the unit of parallelism
        let tbats = ModelParams::new()
            .with("use_arma_errors", false)
            .with("n_jobs", 1);
        registry.register(
            "TBATS",
            ModelEntry::new(ModelFamily::Statistical, true, ParamSource::Fixed(tbats), |p| {
                Ok(Box::new(DampedTrendSmoothing::from_params(p)?))
            }),
        );

        registry.register(
            "Prophet",
            ModelEntry::new(ModelFamily::Statistical, true, ParamSource::tuned(), |p| {
                Ok(Box::new(TrendRegression::from_params(p)?))
            }),
        );

        registry.register(
            "RandomForest",
            ModelEntry::new(ModelFamily::Tree, false, ParamSource::tuned(), |p| {
                Ok(Box::new(LagTreeModel::random_forest(p)?))
            }),
        );
        registry.register(
            "XGB",
            ModelEntry::new(ModelFamily::Tree, false, ParamSource::tuned(), |p| {
                Ok(Box::new(LagTreeModel::boosted("XGB", p, 0.3)?))
            }),
        );
        registry.register(
            "LightGBM",
            ModelEntry::new(ModelFamily::Tree, false, ParamSource::tuned(), |p| {
                Ok(Box::new(LagTreeModel::boosted("LightGBM", p, 0.1)?))
            }),
        );

        for model in ["NBEATS", "RNN", "TCN", "TFT", "NHiTS"] {
            registry.register(model, neural_entry(ModelParams::new()));
        }
        for (model, cell) in [("LSTM", "LSTM"), ("GRU", "GRU")] {
            registry.register(model, neural_entry(ModelParams::new().with("model", cell)));
        }

        registry
    }
}

fn neural_entry(extra: ModelParams) -> ModelEntry {
    ModelEntry::new(ModelFamily::Neural, false, ParamSource::tagged(extra), |p| {
        Ok(Box::new(LinearAutoregressor::from_params(p)?))
    })
}
