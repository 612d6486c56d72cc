#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use forecast_sweep::error::{Result, SweepError};
use forecast_sweep::models::{ModelEntry, ModelFamily, ModelParams, ModelRegistry, ParamSource};
use forecast_sweep::{Forecaster, TimeSeries};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared construction and fit counters of a registered test model
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub constructed: Arc<AtomicUsize>,
    pub fits: Arc<AtomicUsize>,
}

impl Counters {
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn fits(&self) -> usize {
        self.fits.load(Ordering::SeqCst)
    }
}

/// Predicts the last close it has seen. Local instances refuse to
/// forecast a history they were not fitted on.
#[derive(Debug)]
pub struct LastValue {
    last: Option<f64>,
    local: bool,
    fits: Arc<AtomicUsize>,
}

impl Forecaster for LastValue {
    fn name(&self) -> &str {
        "LastValue"
    }

    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        self.last = series.close_values().last().copied();
        self.fits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn predict(&self, n: usize) -> Result<Vec<f64>> {
        let last = self
            .last
            .ok_or_else(|| SweepError::ModelError("not fitted".to_string()))?;
        Ok(vec![last; n])
    }

    fn predict_from(&self, history: &TimeSeries, n: usize) -> Result<Vec<f64>> {
        if self.local {
            return Err(SweepError::ModelError("local model".to_string()));
        }
        let last = history
            .close_values()
            .last()
            .copied()
            .ok_or_else(|| SweepError::ModelError("empty history".to_string()))?;
        Ok(vec![last; n])
    }
}

/// Registry entry for a [`LastValue`] model wired to `counters`
pub fn last_value_entry(requires_retrain: bool, counters: &Counters) -> ModelEntry {
    let counters = counters.clone();
    let family = if requires_retrain {
        ModelFamily::Statistical
    } else {
        ModelFamily::Tree
    };
    ModelEntry::new(family, requires_retrain, ParamSource::Fixed(ModelParams::new()), move |_| {
        counters.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(LastValue {
            last: None,
            local: requires_retrain,
            fits: counters.fits.clone(),
        }))
    })
}

/// Registry of test models: `Local` is retrained, `Global` and `Other` are not
pub fn test_registry(local: &Counters, global: &Counters) -> ModelRegistry {
    ModelRegistry::new()
        .with("Local", last_value_entry(true, local))
        .with("Global", last_value_entry(false, global))
        .with("Other", last_value_entry(false, &Counters::default()))
}

/// Hourly OHLCV candles drifting upwards with a daily cycle
pub fn candles(n: usize) -> TimeSeries {
    let start = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
    let timestamps = (0..n).map(|i| start + Duration::hours(i as i64)).collect();
    let close: Vec<f64> = (0..n)
        .map(|i| 100.0 + 0.1 * i as f64 + (i as f64 * std::f64::consts::PI / 12.0).sin())
        .collect();
    let open = close.iter().map(|c| c - 0.2).collect();
    let high = close.iter().map(|c| c + 0.5).collect();
    let low = close.iter().map(|c| c - 0.5).collect();
    let volume = (0..n).map(|i| 1000.0 + (i % 7) as f64).collect();
    TimeSeries::new(
        timestamps,
        vec![
            ("open".to_string(), open),
            ("high".to_string(), high),
            ("low".to_string(), low),
            ("close".to_string(), close),
            ("volume".to_string(), volume),
        ],
    )
    .unwrap()
}

/// Write `series` as an exchange-style CSV dump
pub fn write_candles_csv(path: &Path, series: &TimeSeries) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "timestamp,{}", series.columns().join(",")).unwrap();
    for (i, ts) in series.timestamps().iter().enumerate() {
        let row: Vec<String> = series.row(i).unwrap().iter().map(|v| v.to_string()).collect();
        writeln!(file, "{},{}", ts.format("%Y-%m-%d %H:%M:%S"), row.join(",")).unwrap();
    }
}
