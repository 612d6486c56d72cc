//! Train/test period layouts for rolling-origin backtests

use crate::data::{DataLoader, TimeSeries};
use crate::error::{Result, SweepError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Per-period train, test and full (train followed by test) segments
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSet {
    pub train: Vec<TimeSeries>,
    pub test: Vec<TimeSeries>,
    pub full: Vec<TimeSeries>,
}

impl PeriodSet {
    /// Assemble a period set, checking every train segment precedes its test segment
    pub fn new(train: Vec<TimeSeries>, test: Vec<TimeSeries>) -> Result<Self> {
        if train.len() != test.len() {
            return Err(SweepError::DataError(format!(
                "Got {} train segments but {} test segments",
                train.len(),
                test.len()
            )));
        }

        let full = train
            .iter()
            .zip(&test)
            .map(|(tr, te)| tr.concat(te))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { train, test, full })
    }

    /// Number of periods
    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }
}

/// Source of per-period train/test segments for a sweep cell
pub trait PeriodSplitter {
    /// Split the series of `asset`/`time_frame` into `n_periods` ordered
    /// periods. `column` restricts every segment to a single component.
    fn get_train_test(
        &self,
        asset: &str,
        time_frame: &str,
        n_periods: usize,
        column: Option<&str>,
    ) -> Result<PeriodSet>;
}

/// How training windows move between periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Fixed-length training window rolled forward by one test length
    #[default]
    Sliding,
    /// Training window anchored at the first point, growing by one test length
    Expanding,
}

/// Geometry of the period layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Training points in the first period; `None` uses all available history
    pub train_size: Option<usize>,
    /// Test points per period (also the stride between periods)
    pub test_size: usize,
    pub window: WindowMode,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_size: None,
            test_size: 250,
            window: WindowMode::Sliding,
        }
    }
}

/// Lay out `n_periods` periods ending at the last observation of `series`.
///
/// Consecutive periods are shifted by `test_size`, so test segments tile the
/// tail of the series without overlapping.
pub fn split_series(series: &TimeSeries, n_periods: usize, config: &SplitConfig) -> Result<PeriodSet> {
    if n_periods == 0 {
        return Err(SweepError::InvalidParameter(
            "Number of periods must be positive".to_string(),
        ));
    }
    if config.test_size == 0 {
        return Err(SweepError::InvalidParameter(
            "Test size must be positive".to_string(),
        ));
    }

    let tested = n_periods * config.test_size;
    let available = series.len().saturating_sub(tested);
    let first_train = config.train_size.unwrap_or(available);
    if first_train == 0 || first_train > available {
        return Err(SweepError::DataError(format!(
            "Series of {} points cannot hold {} periods of {} test points with {} training points",
            series.len(),
            n_periods,
            config.test_size,
            first_train
        )));
    }

    let offset = available - first_train;
    let mut train = Vec::with_capacity(n_periods);
    let mut test = Vec::with_capacity(n_periods);

    for period in 0..n_periods {
        let shift = period * config.test_size;
        let (start, end) = match config.window {
            WindowMode::Sliding => (offset + shift, offset + shift + first_train),
            WindowMode::Expanding => (offset, offset + first_train + shift),
        };
        train.push(series.slice(start, end)?);
        test.push(series.slice(end, end + config.test_size)?);
    }

    PeriodSet::new(train, test)
}

fn restrict(series: TimeSeries, column: Option<&str>) -> Result<TimeSeries> {
    match column {
        Some(name) => series.select(name),
        None => Ok(series),
    }
}

/// Splits series loaded from CSV files laid out by a path pattern
#[derive(Debug, Clone)]
pub struct RollingSplitter {
    data_dir: PathBuf,
    /// File name pattern with `{asset}` and `{time_frame}` placeholders
    series_file: String,
    config: SplitConfig,
}

impl RollingSplitter {
    pub fn new(data_dir: impl Into<PathBuf>, series_file: &str, config: SplitConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            series_file: series_file.to_string(),
            config,
        }
    }

    /// Location of the series for a cell
    pub fn series_path(&self, asset: &str, time_frame: &str) -> PathBuf {
        let relative = self
            .series_file
            .replace("{asset}", asset)
            .replace("{time_frame}", time_frame);
        self.data_dir.join(relative)
    }
}

impl PeriodSplitter for RollingSplitter {
    fn get_train_test(
        &self,
        asset: &str,
        time_frame: &str,
        n_periods: usize,
        column: Option<&str>,
    ) -> Result<PeriodSet> {
        let path = self.series_path(asset, time_frame);
        let series = DataLoader::from_csv(&path).map_err(|e| {
            SweepError::DataError(format!("Failed to load {}: {}", path.display(), e))
        })?;
        split_series(&restrict(series, column)?, n_periods, &self.config)
    }
}

/// Splits series held in memory, keyed by (asset, time frame)
#[derive(Debug, Clone, Default)]
pub struct InMemorySplitter {
    series: HashMap<(String, String), TimeSeries>,
    config: SplitConfig,
}

impl InMemorySplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self {
            series: HashMap::new(),
            config,
        }
    }

    /// Register the series of a cell, replacing any previous one
    pub fn insert(&mut self, asset: &str, time_frame: &str, series: TimeSeries) {
        self.series
            .insert((asset.to_string(), time_frame.to_string()), series);
    }

    pub fn with_series(mut self, asset: &str, time_frame: &str, series: TimeSeries) -> Self {
        self.insert(asset, time_frame, series);
        self
    }
}

impl PeriodSplitter for InMemorySplitter {
    fn get_train_test(
        &self,
        asset: &str,
        time_frame: &str,
        n_periods: usize,
        column: Option<&str>,
    ) -> Result<PeriodSet> {
        let series = self
            .series
            .get(&(asset.to_string(), time_frame.to_string()))
            .ok_or_else(|| {
                SweepError::DataError(format!("No series registered for {}/{}", asset, time_frame))
            })?;
        split_series(&restrict(series.clone(), column)?, n_periods, &self.config)
    }
}
