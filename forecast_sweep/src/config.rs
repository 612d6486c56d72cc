//! Sweep configuration
//!
//! Catalogs, period geometry and output locations are read once from TOML
//! and handed to the driver; nothing in the sweep reads ambient state.
//!
//! ```toml
//! assets = ["BTC", "ETH"]
//! time_frames = ["1m", "1h"]
//! n_periods = 5
//! on_failure = "skip"
//!
//! [split]
//! test_size = 250
//! window = "sliding"
//! ```

use crate::artifacts::OutputKind;
use crate::error::{Result, SweepError};
use crate::split::SplitConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What the sweep does when a cell fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Return the first failure
    #[default]
    Halt,
    /// Log the failure, record it in the report and move to the next cell
    Skip,
}

/// How many periods the gap audit inspects per cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// Check every period and report each missing one
    #[default]
    AllPeriods,
    /// Stop at the first missing period of a cell
    FirstGap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Assets in sweep order
    pub assets: Vec<String>,
    /// Time frames in sweep order
    pub time_frames: Vec<String>,
    /// Full model catalog in sweep order
    pub models: Vec<String>,
    /// Models swept by the extended variant
    pub ml_models: Vec<String>,
    pub n_periods: usize,
    pub split: SplitConfig,
    pub data_dir: PathBuf,
    /// Series file relative to `data_dir`, with `{asset}` and `{time_frame}` placeholders
    pub series_file: String,
    pub output_root: PathBuf,
    /// Component kept by the raw variant
    pub target_column: String,
    /// JSON store of tuned parameters
    pub hyperparameters: Option<PathBuf>,
    pub on_failure: FailureMode,
    pub audit: AuditMode,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            assets: strings(&["BTC", "ETH"]),
            time_frames: strings(&["1m", "15m", "4h", "1d"]),
            models: strings(&[
                "ARIMA",
                "TBATS",
                "Prophet",
                "RandomForest",
                "XGB",
                "LightGBM",
                "NBEATS",
                "RNN",
                "LSTM",
                "GRU",
                "TCN",
                "TFT",
                "NHiTS",
            ]),
            ml_models: strings(&[
                "RandomForest",
                "XGB",
                "LightGBM",
                "NBEATS",
                "RNN",
                "LSTM",
                "GRU",
                "TCN",
                "TFT",
                "NHiTS",
            ]),
            n_periods: 5,
            split: SplitConfig::default(),
            data_dir: PathBuf::from("data/coins"),
            series_file: "{asset}/{asset}USDT_{time_frame}.csv".to_string(),
            output_root: PathBuf::from("data"),
            target_column: "close".to_string(),
            hyperparameters: None,
            on_failure: FailureMode::Halt,
            audit: AuditMode::AllPeriods,
        }
    }
}

impl SweepConfig {
    /// Load and validate a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)
            .map_err(|e| SweepError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| SweepError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SweepError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, catalog) in [
            ("assets", &self.assets),
            ("time_frames", &self.time_frames),
            ("models", &self.models),
        ] {
            if catalog.is_empty() {
                return Err(SweepError::Config(format!("{} cannot be empty", name)));
            }
            if let Some(duplicate) = catalog
                .iter()
                .enumerate()
                .find(|(i, v)| catalog[..*i].contains(*v))
                .map(|(_, v)| v)
            {
                return Err(SweepError::Config(format!(
                    "{} lists {} more than once",
                    name, duplicate
                )));
            }
        }
        if let Some(stray) = self.ml_models.iter().find(|m| !self.models.contains(m)) {
            return Err(SweepError::Config(format!(
                "ml_models entry {} is not in models",
                stray
            )));
        }
        if self.n_periods == 0 {
            return Err(SweepError::Config("n_periods must be at least 1".to_string()));
        }
        if self.split.test_size == 0 {
            return Err(SweepError::Config("split.test_size must be at least 1".to_string()));
        }
        if self.split.train_size == Some(0) {
            return Err(SweepError::Config("split.train_size must be at least 1".to_string()));
        }
        if !self.series_file.contains("{asset}") || !self.series_file.contains("{time_frame}") {
            return Err(SweepError::Config(
                "series_file must contain {asset} and {time_frame} placeholders".to_string(),
            ));
        }
        Ok(())
    }

    /// Model catalog swept for an output kind
    pub fn catalog(&self, kind: OutputKind) -> &[String] {
        match kind {
            OutputKind::ExtendedModels => &self.ml_models,
            OutputKind::Models | OutputKind::RawModels => &self.models,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::WindowMode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = SweepConfig::default();
        config.validate().unwrap();
        assert_eq!(config.n_periods, 5);
        assert_eq!(config.output_root, PathBuf::from("data"));
        assert_eq!(config.catalog(OutputKind::Models).len(), 13);
        assert_eq!(config.catalog(OutputKind::ExtendedModels).len(), 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SweepConfig::from_toml_str(
            r#"
            assets = ["SOL"]
            on_failure = "skip"
            audit = "first_gap"

            [split]
            train_size = 500
            test_size = 50
            window = "expanding"
            "#,
        )
        .unwrap();
        assert_eq!(config.assets, vec!["SOL".to_string()]);
        assert_eq!(config.on_failure, FailureMode::Skip);
        assert_eq!(config.audit, AuditMode::FirstGap);
        assert_eq!(config.split.train_size, Some(500));
        assert_eq!(config.split.window, WindowMode::Expanding);
        assert_eq!(config.time_frames, SweepConfig::default().time_frames);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = SweepConfig {
            hyperparameters: Some(PathBuf::from("hyperparameters.json")),
            ..SweepConfig::default()
        };
        let parsed = SweepConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_configs() {
        for raw in [
            "assets = []",
            "n_periods = 0",
            "models = [\"ARIMA\", \"ARIMA\"]",
            "models = [\"ARIMA\"]\nml_models = [\"XGB\"]",
            "series_file = \"prices.csv\"",
            "[split]\ntest_size = 0",
            "on_failure = \"retry\"",
        ] {
            assert!(SweepConfig::from_toml_str(raw).is_err(), "{}", raw);
        }
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/sweep.toml");
        let config = SweepConfig::load(path).unwrap();
        let defaults = SweepConfig::default();
        assert_eq!(config.models, defaults.models);
        assert_eq!(config.ml_models, defaults.ml_models);
        assert_eq!(config.split, defaults.split);
        assert_eq!(config.hyperparameters, Some(PathBuf::from("data/hyperparameters.json")));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.toml");
        fs::write(&path, "n_periods = 0").unwrap();
        let err = SweepConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("sweep.toml"));
    }
}
