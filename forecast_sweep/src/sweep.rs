//! Sweeps over the (model, asset, time frame) grid

use crate::artifacts::OutputKind;
use crate::config::{FailureMode, SweepConfig};
use crate::engine::{CellReport, RollingForecastEngine};
use crate::error::{Result, SweepError};
use crate::models::{ModelContext, ModelFactory};
use std::collections::BTreeSet;
use tracing::{error, info, warn};

/// Where an interrupted sweep picks up again.
///
/// The asset and time frame only apply to the starting model: that model
/// resumes at exactly (asset, time frame) and every later model sweeps its
/// full grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepStart {
    pub model: Option<String>,
    pub asset: Option<String>,
    pub time_frame: Option<String>,
}

impl SweepStart {
    pub fn at_model(model: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            ..Self::default()
        }
    }

    pub fn at_cell(model: &str, asset: &str, time_frame: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            asset: Some(asset.to_string()),
            time_frame: Some(time_frame.to_string()),
        }
    }
}

/// A cell that failed in skip mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFailure {
    pub context: ModelContext,
    pub error: String,
}

/// Outcome of a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub kind: OutputKind,
    pub completed: Vec<CellReport>,
    pub failed: Vec<CellFailure>,
    /// Models whose remaining cells were skipped because they are not supported
    pub unsupported: Vec<String>,
}

impl SweepReport {
    fn new(kind: OutputKind) -> Self {
        Self {
            kind,
            completed: Vec::new(),
            failed: Vec::new(),
            unsupported: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.unsupported.is_empty()
    }
}

fn position(catalog: &[String], value: &str, what: &str) -> Result<usize> {
    catalog
        .iter()
        .position(|v| v == value)
        .ok_or_else(|| SweepError::Config(format!("Unknown {} '{}'", what, value)))
}

/// Enumerates grid cells in catalog order and runs each through the engine
pub struct SweepDriver<'a> {
    config: &'a SweepConfig,
    engine: RollingForecastEngine<'a>,
    factory: ModelFactory<'a>,
}

impl<'a> SweepDriver<'a> {
    pub fn new(config: &'a SweepConfig, factory: ModelFactory<'a>, engine: RollingForecastEngine<'a>) -> Self {
        Self {
            config,
            engine,
            factory,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        self.config
    }

    pub fn engine(&self) -> &RollingForecastEngine<'a> {
        &self.engine
    }

    /// Cells a sweep over `models` visits, in order
    pub fn plan(&self, models: &[String], start: &SweepStart, ignore: &[String]) -> Result<Vec<ModelContext>> {
        let assets = &self.config.assets;
        let time_frames = &self.config.time_frames;

        let first_model = match &start.model {
            Some(model) => position(models, model, "start model")?,
            None => 0,
        };
        let anchor_asset = match &start.asset {
            Some(asset) => position(assets, asset, "start asset")?,
            None => 0,
        };
        let anchor_time_frame = match &start.time_frame {
            Some(time_frame) => position(time_frames, time_frame, "start time frame")?,
            None => 0,
        };

        let mut cells = Vec::new();
        for model in &models[first_model..] {
            if ignore.contains(model) {
                continue;
            }
            let resuming = start.model.as_deref() == Some(model.as_str());
            let first_asset = if resuming { anchor_asset } else { 0 };

            for (a, asset) in assets.iter().enumerate().skip(first_asset) {
                let first_time_frame = if resuming && a == anchor_asset {
                    anchor_time_frame
                } else {
                    0
                };
                for time_frame in &time_frames[first_time_frame..] {
                    cells.push(ModelContext::new(model, asset, time_frame));
                }
            }
        }
        Ok(cells)
    }

    /// Sweep the catalog configured for `kind`
    pub fn sweep_all(&self, kind: OutputKind, start: &SweepStart, ignore: &[String]) -> Result<SweepReport> {
        let catalog = self.config.catalog(kind);
        let cells = self.plan(catalog, start, ignore)?;
        info!(kind = %kind, models = catalog.len(), cells = cells.len(), "starting sweep");
        self.run_cells(kind, &cells)
    }

    /// Standard forecasts for the full model catalog
    pub fn forecast_all(&self, start: &SweepStart, ignore: &[String]) -> Result<SweepReport> {
        self.sweep_all(OutputKind::Models, start, ignore)
    }

    /// Raw (target component only) forecasts for the full model catalog
    pub fn raw_all(&self, start: &SweepStart, ignore: &[String]) -> Result<SweepReport> {
        self.sweep_all(OutputKind::RawModels, start, ignore)
    }

    /// Extended forecasts for the ML catalog
    pub fn extend_all(&self, start: &SweepStart, ignore: &[String]) -> Result<SweepReport> {
        self.sweep_all(OutputKind::ExtendedModels, start, ignore)
    }

    /// Every asset and time frame of one model, optionally resuming mid-grid
    pub fn forecast_model(
        &self,
        kind: OutputKind,
        model: &str,
        start_asset: Option<&str>,
        start_time_frame: Option<&str>,
    ) -> Result<SweepReport> {
        let start = SweepStart {
            model: Some(model.to_string()),
            asset: start_asset.map(str::to_string),
            time_frame: start_time_frame.map(str::to_string),
        };
        let cells = self.plan(&[model.to_string()], &start, &[])?;
        self.run_cells(kind, &cells)
    }

    /// Run the given cells in order, honouring the configured failure mode
    pub fn run_cells(&self, kind: OutputKind, cells: &[ModelContext]) -> Result<SweepReport> {
        let mut report = SweepReport::new(kind);
        let mut unsupported = BTreeSet::new();
        let store = self.engine.store();

        for (i, context) in cells.iter().enumerate() {
            if unsupported.contains(&context.model) {
                continue;
            }
            info!(kind = %kind, cell = %context, "cell {}/{}", i + 1, cells.len());

            let outcome = store
                .ensure_cell_dir(kind, context)
                .and_then(|_| self.engine.run_kind(kind, context));

            match outcome {
                Ok(cell) => report.completed.push(cell),
                Err(err) if self.config.on_failure == FailureMode::Halt => {
                    error!(cell = %context, error = %err.chain(), "halting sweep");
                    return Err(err);
                }
                Err(err) => {
                    warn!(cell = %context, error = %err.chain(), "skipping failed cell");
                    if err.is_unsupported_model() {
                        unsupported.insert(context.model.clone());
                        report.unsupported.push(context.model.clone());
                    }
                    report.failed.push(CellFailure {
                        context: context.clone(),
                        error: err.chain(),
                    });
                }
            }
        }

        info!(
            kind = %kind,
            completed = report.completed.len(),
            failed = report.failed.len(),
            "sweep finished"
        );
        Ok(report)
    }

    /// Construct every catalog model for every cell, collecting the cells
    /// whose model cannot be built
    pub fn check_models(&self) -> Vec<CellFailure> {
        let mut failures = Vec::new();
        for model in &self.config.models {
            for asset in &self.config.assets {
                for time_frame in &self.config.time_frames {
                    let context = ModelContext::new(model, asset, time_frame);
                    info!(cell = %context, "checking model");
                    if let Err(err) = self.factory.construct(&context) {
                        warn!(cell = %context, error = %err, "model cannot be constructed");
                        failures.push(CellFailure {
                            context,
                            error: err.chain(),
                        });
                    }
                }
            }
        }
        failures
    }
}
