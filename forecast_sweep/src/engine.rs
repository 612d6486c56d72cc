//! Rolling-origin backtests of one sweep cell
//!
//! Three protocols share the engine:
//!
//! - **standard**: every period gets a fresh model fitted on its train
//!   segment, then one-step-ahead forecasts over its test segment;
//! - **raw**: the same on the target component alone;
//! - **extended**: the last period's test segment stays fixed while the
//!   training history grows backwards by one test length per period.

use crate::artifacts::{ArtifactStore, ForecastArtifact, OutputKind};
use crate::data::TimeSeries;
use crate::error::{Result, SweepError};
use crate::models::{historical_forecasts, HistoricalForecastOptions, ModelContext, ModelFactory};
use crate::split::{PeriodSet, PeriodSplitter};
use tracing::{debug, info};

/// What a cell run wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellReport {
    pub kind: OutputKind,
    pub context: ModelContext,
    /// Prediction rows per period, indexed by period
    pub prediction_rows: Vec<usize>,
    /// Training rows per period, indexed by period
    pub train_rows: Vec<usize>,
}

impl CellReport {
    fn new(kind: OutputKind, context: ModelContext, n_periods: usize) -> Self {
        Self {
            kind,
            context,
            prediction_rows: vec![0; n_periods],
            train_rows: vec![0; n_periods],
        }
    }

    pub fn periods(&self) -> usize {
        self.prediction_rows.len()
    }
}

/// Drives forecasters through the backtest protocols and persists the results
pub struct RollingForecastEngine<'a> {
    factory: ModelFactory<'a>,
    splitter: &'a dyn PeriodSplitter,
    store: &'a ArtifactStore,
    /// Periods per cell for the extended protocol
    n_periods: usize,
    /// Component kept by the raw protocol
    target_column: String,
}

impl<'a> RollingForecastEngine<'a> {
    pub fn new(
        factory: ModelFactory<'a>,
        splitter: &'a dyn PeriodSplitter,
        store: &'a ArtifactStore,
        n_periods: usize,
        target_column: &str,
    ) -> Self {
        Self {
            factory,
            splitter,
            store,
            n_periods,
            target_column: target_column.to_string(),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        self.store
    }

    /// Standard protocol over all components
    pub fn run(&self, model: &str, asset: &str, time_frame: &str, n_periods: usize) -> Result<CellReport> {
        let context = ModelContext::new(model, asset, time_frame);
        self.run_rolling(OutputKind::Models, &context, n_periods, None)
    }

    /// Standard protocol over the target component only
    pub fn run_raw(&self, model: &str, asset: &str, time_frame: &str, n_periods: usize) -> Result<CellReport> {
        let context = ModelContext::new(model, asset, time_frame);
        self.run_rolling(OutputKind::RawModels, &context, n_periods, Some(self.target_column.as_str()))
    }

    /// Backward-extending protocol over the configured number of periods
    pub fn run_extended(&self, model: &str, asset: &str, time_frame: &str) -> Result<CellReport> {
        let context = ModelContext::new(model, asset, time_frame);
        self.extend(&context)
    }

    /// Run the protocol that produces `kind` with the configured period count
    pub fn run_kind(&self, kind: OutputKind, context: &ModelContext) -> Result<CellReport> {
        match kind {
            OutputKind::Models => self.run(&context.model, &context.asset, &context.time_frame, self.n_periods),
            OutputKind::RawModels => {
                self.run_raw(&context.model, &context.asset, &context.time_frame, self.n_periods)
            }
            OutputKind::ExtendedModels => self.extend(context),
        }
    }

    fn periods(&self, context: &ModelContext, n_periods: usize, column: Option<&str>) -> Result<PeriodSet> {
        let set = self
            .splitter
            .get_train_test(&context.asset, &context.time_frame, n_periods, column)?;
        if set.len() != n_periods {
            return Err(SweepError::DataError(format!(
                "Splitter returned {} periods for {}, expected {}",
                set.len(),
                context,
                n_periods
            )));
        }
        Ok(set)
    }

    fn run_rolling(
        &self,
        kind: OutputKind,
        context: &ModelContext,
        n_periods: usize,
        column: Option<&str>,
    ) -> Result<CellReport> {
        // Unknown models fail before any data is touched
        let retrain = self.factory.registry().requires_retrain(&context.model)?;
        let set = self.periods(context, n_periods, column)?;
        let train_length = retrain.then(|| set.train[0].len());

        info!(kind = %kind, cell = %context, n_periods, retrain, "forecasting cell");
        let mut report = CellReport::new(kind, context.clone(), n_periods);

        for period in 0..n_periods {
            let train = &set.train[period];
            let options = HistoricalForecastOptions::one_step(train.len()).with_retrain(retrain, train_length);

            let prediction = self
                .forecast_period(context, train, &set.full[period], &options)
                .map_err(|cause| {
                    SweepError::forecast_failure(&context.model, &context.asset, &context.time_frame, period, cause)
                })?;

            self.store.write_period(
                kind,
                context,
                period,
                &ForecastArtifact {
                    prediction: &prediction,
                    train,
                    test: &set.test[period],
                },
            )?;

            debug!(cell = %context, period, train = train.len(), predicted = prediction.len(), "period done");
            report.prediction_rows[period] = prediction.len();
            report.train_rows[period] = train.len();
        }

        info!(kind = %kind, cell = %context, "cell complete");
        Ok(report)
    }

    fn extend(&self, context: &ModelContext) -> Result<CellReport> {
        let kind = OutputKind::ExtendedModels;
        self.factory.registry().get(&context.model)?;
        let n_periods = self.n_periods;
        if n_periods == 0 {
            return Err(SweepError::InvalidParameter(
                "The extended protocol needs at least one period".to_string(),
            ));
        }
        let set = self.periods(context, n_periods, None)?;

        let last = n_periods - 1;
        let final_test = &set.test[last];
        let mut complete = set.full[last].clone();

        info!(kind = %kind, cell = %context, n_periods, "forecasting cell");
        let mut report = CellReport::new(kind, context.clone(), n_periods);

        for period in (0..n_periods).rev() {
            let failure = |cause| {
                SweepError::forecast_failure(&context.model, &context.asset, &context.time_frame, period, cause)
            };

            let extended_train = complete.drop_last(final_test.len()).map_err(failure)?;
            let options = HistoricalForecastOptions::one_step(extended_train.len());
            let prediction = self
                .forecast_period(context, &extended_train, &complete, &options)
                .map_err(failure)?;

            self.store.write_period(
                kind,
                context,
                period,
                &ForecastArtifact {
                    prediction: &prediction,
                    train: &extended_train,
                    test: final_test,
                },
            )?;

            debug!(cell = %context, period, train = extended_train.len(), "period done");
            report.prediction_rows[period] = prediction.len();
            report.train_rows[period] = extended_train.len();

            if period == 0 {
                break;
            }

            // Roll one test length further into the past
            let earlier = set.train[period - 1].head(final_test.len());
            complete = earlier.concat(&complete).map_err(failure)?;
        }

        info!(kind = %kind, cell = %context, "cell complete");
        Ok(report)
    }

    /// Fresh model, fitted on `train`, forecasting `series` from `options.start`
    fn forecast_period(
        &self,
        context: &ModelContext,
        train: &TimeSeries,
        series: &TimeSeries,
        options: &HistoricalForecastOptions,
    ) -> Result<TimeSeries> {
        let mut model = self.factory.construct(context)?;
        model.fit(train)?;
        historical_forecasts(model.as_mut(), series, options)
    }
}
