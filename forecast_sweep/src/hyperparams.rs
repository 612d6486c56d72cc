//! Tuned hyperparameter lookup keyed by (model, asset, time frame)

use crate::error::{Result, SweepError};
use crate::models::ModelParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Key that matches any asset or time frame
pub const WILDCARD: &str = "*";

/// Source of constructor-ready parameter sets
pub trait HyperparameterSource {
    /// The best known parameters for a cell; fails when none were recorded
    fn best_hyperparameters(&self, model: &str, asset: &str, time_frame: &str) -> Result<ModelParams>;
}

type Nested = BTreeMap<String, BTreeMap<String, BTreeMap<String, ModelParams>>>;

/// Parameter sets stored as nested JSON objects:
/// `{ "<model>": { "<asset>": { "<time_frame>": { ...params } } } }`.
///
/// `"*"` may stand in for the asset or time frame; exact keys win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonHyperparameterStore {
    entries: Nested,
}

impl JsonHyperparameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            SweepError::Hyperparameter(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let store = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), models = store.entries.len(), "loaded hyperparameter store");
        Ok(store)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn insert(&mut self, model: &str, asset: &str, time_frame: &str, params: ModelParams) {
        self.entries
            .entry(model.to_string())
            .or_default()
            .entry(asset.to_string())
            .or_default()
            .insert(time_frame.to_string(), params);
    }

    pub fn with(mut self, model: &str, asset: &str, time_frame: &str, params: ModelParams) -> Self {
        self.insert(model, asset, time_frame, params);
        self
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl HyperparameterSource for JsonHyperparameterStore {
    fn best_hyperparameters(&self, model: &str, asset: &str, time_frame: &str) -> Result<ModelParams> {
        let by_asset = self.entries.get(model).ok_or_else(|| {
            SweepError::Hyperparameter(format!("No tuned parameters for model {}", model))
        })?;

        [asset, WILDCARD]
            .into_iter()
            .filter_map(|a| by_asset.get(a))
            .find_map(|by_tf| by_tf.get(time_frame).or_else(|| by_tf.get(WILDCARD)))
            .cloned()
            .ok_or_else(|| {
                SweepError::Hyperparameter(format!(
                    "No tuned parameters for {}/{}/{}",
                    model, asset, time_frame
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const STORE: &str = r#"{
        "XGB": {
            "BTC": { "1h": { "lags": 24, "learning_rate": 0.05 } },
            "*": { "*": { "lags": 12 } }
        },
        "NBEATS": {
            "ETH": { "*": { "input_chunk_length": 48 } }
        }
    }"#;

    #[test]
    fn test_exact_match() {
        let store = JsonHyperparameterStore::from_json_str(STORE).unwrap();
        let params = store.best_hyperparameters("XGB", "BTC", "1h").unwrap();
        assert_eq!(params.usize_or("lags", 0).unwrap(), 24);
        assert_eq!(params.f64_or("learning_rate", 0.0).unwrap(), 0.05);
    }

    #[test]
    fn test_wildcard_fallback() {
        let store = JsonHyperparameterStore::from_json_str(STORE).unwrap();
        assert_eq!(
            store.best_hyperparameters("XGB", "BTC", "4h").unwrap(),
            ModelParams::new().with("lags", 12)
        );
        assert_eq!(
            store
                .best_hyperparameters("NBEATS", "ETH", "1m")
                .unwrap()
                .usize_or("input_chunk_length", 0)
                .unwrap(),
            48
        );
    }

    #[test]
    fn test_missing_parameters_fail() {
        let store = JsonHyperparameterStore::from_json_str(STORE).unwrap();
        assert!(store.best_hyperparameters("NBEATS", "BTC", "1h").is_err());
        assert!(store.best_hyperparameters("TFT", "BTC", "1h").is_err());
    }

    #[test]
    fn test_from_path_and_back() {
        let store = JsonHyperparameterStore::new().with("RNN", "BTC", "1d", ModelParams::new().with("n_epochs", 5));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(store.to_json_string().unwrap().as_bytes()).unwrap();

        let loaded = JsonHyperparameterStore::from_path(file.path()).unwrap();
        assert_eq!(loaded, store);
        assert!(JsonHyperparameterStore::from_path("/nonexistent/params.json").is_err());
    }
}
