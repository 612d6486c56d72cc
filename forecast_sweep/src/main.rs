//! Command line entry point for forecast sweeps
//!
//! # Resume the standard sweep at XGB on ETH/4h
//! forecast-sweep --config config/sweep.toml run-all --kind models --start-model XGB --start-asset ETH --start-time-frame 4h
//!
//! # Regenerate every cell with missing extended forecasts
//! forecast-sweep --config config/sweep.toml repair --kind extended-models

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forecast_sweep::artifacts::{ArtifactStore, OutputKind};
use forecast_sweep::audit::GapAuditor;
use forecast_sweep::config::SweepConfig;
use forecast_sweep::engine::RollingForecastEngine;
use forecast_sweep::hyperparams::JsonHyperparameterStore;
use forecast_sweep::metrics::evaluate_cell;
use forecast_sweep::models::{ModelContext, ModelFactory, ModelRegistry};
use forecast_sweep::split::RollingSplitter;
use forecast_sweep::sweep::{SweepDriver, SweepReport, SweepStart};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "forecast-sweep")]
#[command(about = "Rolling-origin forecast sweeps over models, assets and time frames")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep every model of the catalog for an artifact kind
    RunAll {
        #[arg(short, long, value_enum)]
        kind: OutputKind,

        /// Model to resume from
        #[arg(long)]
        start_model: Option<String>,

        /// Asset to resume from (with --start-model)
        #[arg(long, requires = "start_model")]
        start_asset: Option<String>,

        /// Time frame to resume from (with --start-model)
        #[arg(long, requires = "start_model")]
        start_time_frame: Option<String>,

        /// Models to leave out
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,
    },

    /// Sweep every asset and time frame of one model
    RunModel {
        #[arg(short, long, value_enum)]
        kind: OutputKind,

        #[arg(short, long)]
        model: String,

        #[arg(long)]
        asset: Option<String>,

        #[arg(long)]
        time_frame: Option<String>,
    },

    /// List cells with missing prediction files
    FindMissing {
        #[arg(short, long, value_enum)]
        kind: OutputKind,

        /// Restrict the audit to these models
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
    },

    /// Regenerate cells with missing prediction files
    Repair {
        #[arg(short, long, value_enum)]
        kind: OutputKind,

        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
    },

    /// Construct every model for every cell
    CheckModels,

    /// Score the persisted forecasts of one cell
    Evaluate {
        #[arg(short, long, value_enum)]
        kind: OutputKind,

        #[arg(short, long)]
        model: String,

        #[arg(long)]
        asset: String,

        #[arg(long)]
        time_frame: String,
    },
}

fn summarize(report: &SweepReport) -> Result<()> {
    info!(
        kind = %report.kind,
        completed = report.completed.len(),
        failed = report.failed.len(),
        "done"
    );
    for failure in &report.failed {
        warn!(cell = %failure.context, "{}", failure.error);
    }
    if !report.is_success() {
        anyhow::bail!("{} cells failed", report.failed.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("forecast_sweep=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SweepConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => SweepConfig::default(),
    };

    let params = match &config.hyperparameters {
        Some(path) => JsonHyperparameterStore::from_path(path)
            .with_context(|| format!("Failed to load hyperparameters {}", path.display()))?,
        None => {
            warn!("no hyperparameter store configured, tuned models will fail");
            JsonHyperparameterStore::new()
        }
    };

    let registry = ModelRegistry::with_defaults();
    let splitter = RollingSplitter::new(&config.data_dir, &config.series_file, config.split.clone());
    let store = ArtifactStore::new(&config.output_root);
    let factory = ModelFactory::new(&registry, &params);
    let engine = RollingForecastEngine::new(factory, &splitter, &store, config.n_periods, &config.target_column);
    let driver = SweepDriver::new(&config, factory, engine);
    let auditor = GapAuditor::new(&config, &store);

    match cli.command {
        Commands::RunAll {
            kind,
            start_model,
            start_asset,
            start_time_frame,
            ignore,
        } => {
            let start = SweepStart {
                model: start_model,
                asset: start_asset,
                time_frame: start_time_frame,
            };
            let report = driver
                .sweep_all(kind, &start, &ignore)
                .with_context(|| format!("Sweep of {} failed", kind))?;
            summarize(&report)?;
        }
        Commands::RunModel {
            kind,
            model,
            asset,
            time_frame,
        } => {
            let report = driver
                .forecast_model(kind, &model, asset.as_deref(), time_frame.as_deref())
                .with_context(|| format!("Sweep of {} for {} failed", kind, model))?;
            summarize(&report)?;
        }
        Commands::FindMissing { kind, models } => {
            let missing = auditor.find_missing(kind, &models);
            for gap in &missing {
                println!("{}", gap);
            }
            println!("Found {} cells with missing forecasts", missing.len());
        }
        Commands::Repair { kind, models } => {
            let report = auditor
                .repair(&driver, kind, &models)
                .with_context(|| format!("Repair of {} failed", kind))?;
            summarize(&report)?;
        }
        Commands::CheckModels => {
            let failures = driver.check_models();
            for failure in &failures {
                println!("{}: {}", failure.context, failure.error);
            }
            if !failures.is_empty() {
                anyhow::bail!("{} cells cannot construct their model", failures.len());
            }
            println!("All models can be constructed");
        }
        Commands::Evaluate {
            kind,
            model,
            asset,
            time_frame,
        } => {
            let context = ModelContext::new(&model, &asset, &time_frame);
            let report = evaluate_cell(&store, kind, &context, config.n_periods)
                .with_context(|| format!("Evaluation of {} failed", context))?;
            for period in report {
                println!("{} period {} ({} points):", context, period.period, period.aligned);
                println!("{}", period.metrics);
            }
        }
    }

    Ok(())
}
