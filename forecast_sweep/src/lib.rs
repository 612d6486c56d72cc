//! # Forecast Sweep
//!
//! Rolling-origin backtesting of forecasting models over a grid of
//! (model, asset, time frame) cells.
//!
//! ## Features
//!
//! - Period splitting of OHLCV series into ordered, leakage-free train/test pairs
//! - A model registry with per-model retraining policy and tuned parameters
//! - Three backtest protocols: standard, raw (target only) and extended
//!   (training history grown backwards against a fixed test window)
//! - Resumable sweeps with an ignore list and skip-or-halt failure handling
//! - Gap auditing and repair of the persisted artifact tree
//! - Evaluation of persisted forecasts
//!
//! ## Quick Start
//!
//! ```no_run
//! use forecast_sweep::artifacts::ArtifactStore;
//! use forecast_sweep::config::SweepConfig;
//! use forecast_sweep::engine::RollingForecastEngine;
//! use forecast_sweep::hyperparams::JsonHyperparameterStore;
//! use forecast_sweep::models::{ModelFactory, ModelRegistry};
//! use forecast_sweep::split::RollingSplitter;
//! use forecast_sweep::sweep::{SweepDriver, SweepStart};
//!
//! # fn main() -> forecast_sweep::Result<()> {
//! let config = SweepConfig::load("config/sweep.toml")?;
//! let registry = ModelRegistry::with_defaults();
//! let params = JsonHyperparameterStore::from_path("hyperparameters.json")?;
//! let splitter = RollingSplitter::new(&config.data_dir, &config.series_file, config.split.clone());
//! let store = ArtifactStore::new(&config.output_root);
//!
//! let factory = ModelFactory::new(&registry, &params);
//! let engine = RollingForecastEngine::new(factory, &splitter, &store, config.n_periods, &config.target_column);
//! let driver = SweepDriver::new(&config, factory, engine);
//!
//! // Resume the standard sweep at XGB on ETH/4h
//! let report = driver.forecast_all(&SweepStart::at_cell("XGB", "ETH", "4h"), &[])?;
//! println!("{} cells written", report.completed.len());
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod audit;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod hyperparams;
pub mod metrics;
pub mod models;
pub mod split;
pub mod sweep;

// Re-export commonly used types
pub use crate::artifacts::{ArtifactStore, OutputKind};
pub use crate::audit::{GapAuditor, MissingArtifact};
pub use crate::config::SweepConfig;
pub use crate::data::{DataLoader, TimeSeries};
pub use crate::engine::{CellReport, RollingForecastEngine};
pub use crate::error::{Result, SweepError};
pub use crate::models::{Forecaster, ModelContext, ModelFactory, ModelRegistry};
pub use crate::split::{PeriodSet, PeriodSplitter};
pub use crate::sweep::{SweepDriver, SweepReport, SweepStart};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
