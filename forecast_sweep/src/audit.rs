//! Gap detection and repair over the persisted artifact tree

use crate::artifacts::{ArtifactRole, ArtifactStore, OutputKind};
use crate::config::{AuditMode, SweepConfig};
use crate::error::Result;
use crate::models::ModelContext;
use crate::sweep::{SweepDriver, SweepReport};
use std::fmt;
use tracing::{info, warn};

/// A cell with at least one missing prediction file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingArtifact {
    pub model: String,
    pub asset: String,
    pub time_frame: String,
    /// Missing periods, ascending. In first-gap mode only the first one.
    pub periods: Vec<usize>,
}

impl MissingArtifact {
    pub fn context(&self) -> ModelContext {
        ModelContext::new(&self.model, &self.asset, &self.time_frame)
    }
}

impl fmt::Display for MissingArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} missing periods {:?}",
            self.model, self.asset, self.time_frame, self.periods
        )
    }
}

/// Scans the artifact tree of a configured grid
#[derive(Debug, Clone, Copy)]
pub struct GapAuditor<'a> {
    config: &'a SweepConfig,
    store: &'a ArtifactStore,
}

impl<'a> GapAuditor<'a> {
    pub fn new(config: &'a SweepConfig, store: &'a ArtifactStore) -> Self {
        Self { config, store }
    }

    /// Cells of `kind` missing prediction files. An empty `models` audits
    /// the catalog configured for `kind`.
    pub fn find_missing(&self, kind: OutputKind, models: &[String]) -> Vec<MissingArtifact> {
        let catalog = self.config.catalog(kind);
        let selected = if models.is_empty() { catalog } else { models };

        let mut missing = Vec::new();
        for model in selected {
            for asset in &self.config.assets {
                for time_frame in &self.config.time_frames {
                    let context = ModelContext::new(model, asset, time_frame);
                    let periods = self.missing_periods(kind, &context);
                    if periods.is_empty() {
                        continue;
                    }
                    for &period in &periods {
                        warn!(
                            path = %self.store.artifact_path(kind, &context, ArtifactRole::Pred, period).display(),
                            "missing forecast"
                        );
                    }
                    missing.push(MissingArtifact {
                        model: model.clone(),
                        asset: asset.clone(),
                        time_frame: time_frame.clone(),
                        periods,
                    });
                }
            }
        }

        if missing.is_empty() {
            info!(kind = %kind, "no missing forecasts found");
        } else {
            info!(kind = %kind, cells = missing.len(), "found missing forecasts");
        }
        missing
    }

    fn missing_periods(&self, kind: OutputKind, context: &ModelContext) -> Vec<usize> {
        let absent = (0..self.config.n_periods)
            .filter(|&period| !self.store.has_artifact(kind, context, ArtifactRole::Pred, period));
        match self.config.audit {
            AuditMode::AllPeriods => absent.collect(),
            AuditMode::FirstGap => absent.take(1).collect(),
        }
    }

    /// Regenerate every cell reported by [`GapAuditor::find_missing`]
    pub fn repair(&self, driver: &SweepDriver<'_>, kind: OutputKind, models: &[String]) -> Result<SweepReport> {
        let cells: Vec<ModelContext> = self
            .find_missing(kind, models)
            .iter()
            .map(MissingArtifact::context)
            .collect();
        info!(kind = %kind, cells = cells.len(), "repairing gaps");
        driver.run_cells(kind, &cells)
    }
}
