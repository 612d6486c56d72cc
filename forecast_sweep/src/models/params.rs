//! Constructor parameters passed verbatim to forecasters

use crate::error::{Result, SweepError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named parameter set, as stored by the hyperparameter service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParams(Map<String, Value>);

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` on top of these parameters
    pub fn merge(&mut self, other: &ModelParams) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .map(|v| v as usize)
                .ok_or_else(|| type_error(key, "a non-negative integer", value)),
        }
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64> {
        self.usize_or(key, default as usize).map(|v| v as u64)
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .ok_or_else(|| type_error(key, "a number", value)),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| type_error(key, "a boolean", value)),
        }
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_str()
                .ok_or_else(|| type_error(key, "a string", value)),
        }
    }

    /// An integer parameter that must be present
    pub fn require_usize(&self, key: &str) -> Result<usize> {
        if !self.contains(key) {
            return Err(SweepError::InvalidParameter(format!(
                "Missing required parameter '{}'",
                key
            )));
        }
        self.usize_or(key, 0)
    }
}

fn type_error(key: &str, expected: &str, value: &Value) -> SweepError {
    SweepError::InvalidParameter(format!(
        "Parameter '{}' must be {}, got {}",
        key, expected, value
    ))
}

impl From<Map<String, Value>> for ModelParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_getters() {
        let params: ModelParams = serde_json::from_value(json!({
            "lags": 12,
            "learning_rate": 0.1,
            "use_arma_errors": false,
            "model": "LSTM",
            "n_epochs": 5.0,
            "missing": null
        }))
        .unwrap();

        assert_eq!(params.usize_or("lags", 1).unwrap(), 12);
        assert_eq!(params.usize_or("n_epochs", 1).unwrap(), 5);
        assert_eq!(params.usize_or("missing", 3).unwrap(), 3);
        assert_eq!(params.f64_or("learning_rate", 0.3).unwrap(), 0.1);
        assert!(!params.bool_or("use_arma_errors", true).unwrap());
        assert_eq!(params.str_or("model", "RNN").unwrap(), "LSTM");
        assert!(params.usize_or("model", 1).is_err());
        assert!(params.require_usize("absent").is_err());
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = ModelParams::new().with("lags", 3).with("seed", 1);
        base.merge(&ModelParams::new().with("lags", 7));
        assert_eq!(base.usize_or("lags", 0).unwrap(), 7);
        assert_eq!(base.usize_or("seed", 0).unwrap(), 1);
        assert_eq!(base.len(), 2);
    }
}
