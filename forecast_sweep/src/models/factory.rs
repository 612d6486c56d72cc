//! Fresh forecaster construction per sweep cell

use crate::error::Result;
use crate::hyperparams::HyperparameterSource;
use crate::models::{Forecaster, ModelParams, ModelRegistry, ParamSource};
use std::fmt;

/// The sweep cell key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelContext {
    pub model: String,
    pub asset: String,
    pub time_frame: String,
}

impl ModelContext {
    pub fn new(model: &str, asset: &str, time_frame: &str) -> Self {
        Self {
            model: model.to_string(),
            asset: asset.to_string(),
            time_frame: time_frame.to_string(),
        }
    }
}

impl fmt::Display for ModelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.model, self.asset, self.time_frame)
    }
}

/// Builds unfit forecasters from the registry and the tuned parameter source
#[derive(Clone, Copy)]
pub struct ModelFactory<'a> {
    registry: &'a ModelRegistry,
    hyperparameters: &'a dyn HyperparameterSource,
}

impl<'a> ModelFactory<'a> {
    pub fn new(registry: &'a ModelRegistry, hyperparameters: &'a dyn HyperparameterSource) -> Self {
        Self {
            registry,
            hyperparameters,
        }
    }

    pub fn registry(&self) -> &'a ModelRegistry {
        self.registry
    }

    /// Constructor parameters for a cell
    pub fn resolve_params(&self, context: &ModelContext) -> Result<ModelParams> {
        let entry = self.registry.get(&context.model)?;
        match &entry.params {
            ParamSource::Fixed(params) => Ok(params.clone()),
            ParamSource::Tuned {
                tag_model_name,
                extra,
            } => {
                let mut params = self.hyperparameters.best_hyperparameters(
                    &context.model,
                    &context.asset,
                    &context.time_frame,
                )?;
                if *tag_model_name {
                    params.insert("model_name", context.model.as_str());
                }
                params.merge(extra);
                Ok(params)
            }
        }
    }

    /// A fresh, unfit forecaster. Every call builds a new instance.
    pub fn construct(&self, context: &ModelContext) -> Result<Box<dyn Forecaster>> {
        let entry = self.registry.get(&context.model)?;
        let params = self.resolve_params(context)?;
        entry.build(&params)
    }
}

impl fmt::Debug for ModelFactory<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFactory")
            .field("models", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparams::JsonHyperparameterStore;
    use crate::models::testing::ramp;
    use pretty_assertions::assert_eq;

    fn store() -> JsonHyperparameterStore {
        JsonHyperparameterStore::new()
            .with("LSTM", "BTC", "1h", ModelParams::new().with("input_chunk_length", 8))
            .with("XGB", "BTC", "1h", ModelParams::new().with("lags", 4).with("n_estimators", 5))
    }

    #[test]
    fn test_neural_params_are_tagged() {
        let registry = ModelRegistry::with_defaults();
        let store = store();
        let factory = ModelFactory::new(&registry, &store);
        let params = factory
            .resolve_params(&ModelContext::new("LSTM", "BTC", "1h"))
            .unwrap();
        assert_eq!(
            params,
            ModelParams::new()
                .with("input_chunk_length", 8)
                .with("model_name", "LSTM")
                .with("model", "LSTM")
        );
    }

    #[test]
    fn test_fixed_params_ignore_store() {
        let registry = ModelRegistry::with_defaults();
        let store = JsonHyperparameterStore::new();
        let factory = ModelFactory::new(&registry, &store);
        let params = factory
            .resolve_params(&ModelContext::new("TBATS", "ETH", "1d"))
            .unwrap();
        assert_eq!(params.usize_or("n_jobs", 0).unwrap(), 1);
        assert!(!params.bool_or("use_arma_errors", true).unwrap());
    }

    #[test]
    fn test_construct_returns_fresh_instances() {
        let registry = ModelRegistry::with_defaults();
        let store = store();
        let factory = ModelFactory::new(&registry, &store);
        let context = ModelContext::new("XGB", "BTC", "1h");

        let mut first = factory.construct(&context).unwrap();
        first.fit(&ramp(30)).unwrap();
        let second = factory.construct(&context).unwrap();
        assert!(first.predict(1).is_ok());
        assert!(second.predict(1).is_err());
    }

    #[test]
    fn test_errors() {
        let registry = ModelRegistry::with_defaults();
        let store = store();
        let factory = ModelFactory::new(&registry, &store);
        assert!(factory
            .construct(&ModelContext::new("Transformer", "BTC", "1h"))
            .unwrap_err()
            .is_unsupported_model());
        // Tuned model without a stored set
        assert!(factory
            .construct(&ModelContext::new("XGB", "ETH", "1h"))
            .is_err());
    }

    #[test]
    fn test_context_display() {
        assert_eq!(ModelContext::new("ARIMA", "BTC", "1m").to_string(), "ARIMA/BTC/1m");
    }
}
