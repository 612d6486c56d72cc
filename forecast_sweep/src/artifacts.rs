//! Persisted forecast artifacts
//!
//! Layout: `{root}/{kind}/{model}/{asset}/{time_frame}/{pred|train|test}_{period}.csv`,
//! one row per timestamp with a leading `time` column.
//!
//! `train` and `test` files carry every component of the segment they hold.
//! `pred` files carry a single column, the forecast of the target component
//! (named after it, usually `close`), even when the model was fitted on a
//! full OHLCV series. No forecasts of the other components are written.

use crate::data::{parse_timestamp, TimeSeries, TIMESTAMP_FORMAT};
use crate::error::{Result, SweepError};
use crate::models::ModelContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::debug;

/// The three artifact trees, one per engine variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Standard rolling split over the full component set
    Models,
    /// Rolling split over the target component only
    RawModels,
    /// Training history extended backwards against a fixed test window
    ExtendedModels,
}

impl OutputKind {
    pub const ALL: [OutputKind; 3] = [
        OutputKind::Models,
        OutputKind::RawModels,
        OutputKind::ExtendedModels,
    ];

    /// Directory name under the output root
    pub fn dir_name(self) -> &'static str {
        match self {
            OutputKind::Models => "models",
            OutputKind::RawModels => "raw_models",
            OutputKind::ExtendedModels => "extended_models",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for OutputKind {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        OutputKind::ALL
            .into_iter()
            .find(|kind| kind.dir_name() == s)
            .ok_or_else(|| SweepError::Config(format!("Unknown output kind '{}'", s)))
    }
}

/// Which of a period's three files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactRole {
    Pred,
    Train,
    Test,
}

impl ArtifactRole {
    pub const ALL: [ArtifactRole; 3] = [ArtifactRole::Pred, ArtifactRole::Train, ArtifactRole::Test];

    pub fn prefix(self) -> &'static str {
        match self {
            ArtifactRole::Pred => "pred",
            ArtifactRole::Train => "train",
            ArtifactRole::Test => "test",
        }
    }
}

/// Predictions with the train and test segments they came from
#[derive(Debug, Clone, Copy)]
pub struct ForecastArtifact<'a> {
    pub prediction: &'a TimeSeries,
    pub train: &'a TimeSeries,
    pub test: &'a TimeSeries,
}

impl ForecastArtifact<'_> {
    fn part(&self, role: ArtifactRole) -> &TimeSeries {
        match role {
            ArtifactRole::Pred => self.prediction,
            ArtifactRole::Train => self.train,
            ArtifactRole::Test => self.test,
        }
    }
}

/// Reads and writes the artifact tree under one root directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cell_dir(&self, kind: OutputKind, context: &ModelContext) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(&context.model)
            .join(&context.asset)
            .join(&context.time_frame)
    }

    pub fn artifact_path(&self, kind: OutputKind, context: &ModelContext, role: ArtifactRole, period: usize) -> PathBuf {
        self.cell_dir(kind, context)
            .join(format!("{}_{}.csv", role.prefix(), period))
    }

    pub fn ensure_cell_dir(&self, kind: OutputKind, context: &ModelContext) -> Result<PathBuf> {
        let dir = self.cell_dir(kind, context);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn has_artifact(&self, kind: OutputKind, context: &ModelContext, role: ArtifactRole, period: usize) -> bool {
        self.artifact_path(kind, context, role, period).is_file()
    }

    /// Write a period's three files. All of them are staged next to their
    /// targets and only moved into place once every one is complete, so a
    /// failure never leaves a partial period behind.
    pub fn write_period(
        &self,
        kind: OutputKind,
        context: &ModelContext,
        period: usize,
        artifact: &ForecastArtifact<'_>,
    ) -> Result<()> {
        let dir = self.ensure_cell_dir(kind, context)?;

        let staged = ArtifactRole::ALL
            .into_iter()
            .map(|role| -> Result<(ArtifactRole, NamedTempFile)> {
                let mut file = NamedTempFile::new_in(&dir)?;
                write_series(&mut file, artifact.part(role))?;
                file.as_file().sync_all()?;
                Ok((role, file))
            })
            .collect::<Result<Vec<_>>>()?;

        for (role, file) in staged {
            let target = self.artifact_path(kind, context, role, period);
            file.persist(&target).map_err(|e| SweepError::IoError(e.error))?;
        }

        debug!(
            kind = %kind,
            cell = %context,
            period,
            rows = artifact.prediction.len(),
            "wrote period artifacts"
        );
        Ok(())
    }

    pub fn read_artifact(
        &self,
        kind: OutputKind,
        context: &ModelContext,
        role: ArtifactRole,
        period: usize,
    ) -> Result<TimeSeries> {
        read_series(self.artifact_path(kind, context, role, period))
    }
}

/// Write `series` as CSV with a leading `time` column
pub fn write_series<W: Write>(writer: W, series: &TimeSeries) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(series.columns().len() + 1);
    header.push("time");
    header.extend(series.columns().iter().map(String::as_str));
    csv_writer.write_record(&header)?;

    for (i, timestamp) in series.timestamps().iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(timestamp.format(TIMESTAMP_FORMAT).to_string());
        for column in series.columns() {
            let value = series.column(column).map_or(f64::NAN, |values| values[i]);
            record.push(value.to_string());
        }
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Read a series written by [`write_series`]
pub fn read_series<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    if names.is_empty() {
        return Err(SweepError::DataError(format!(
            "{} has no value columns",
            path.display()
        )));
    }

    let mut timestamps = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record?;
        let raw_time = record.get(0).unwrap_or_default();
        let timestamp = parse_timestamp(raw_time).ok_or_else(|| {
            SweepError::DataError(format!("Bad timestamp '{}' in {}", raw_time, path.display()))
        })?;
        timestamps.push(timestamp);
        for (column, field) in values.iter_mut().zip(record.iter().skip(1)) {
            let value = field.trim().parse::<f64>().map_err(|_| {
                SweepError::DataError(format!("Bad value '{}' in {}", field, path.display()))
            })?;
            column.push(value);
        }
    }

    TimeSeries::new(timestamps, names.into_iter().zip(values).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn series(n: usize, offset: i64, columns: &[&str]) -> TimeSeries {
        let start = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
        let timestamps = (0..n).map(|i| start + Duration::hours(offset + i as i64)).collect();
        let data = columns
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let values = (0..n).map(|i| 100.0 + i as f64 * 0.25 + c as f64).collect();
                (name.to_string(), values)
            })
            .collect();
        TimeSeries::new(timestamps, data).unwrap()
    }

    #[rstest]
    #[case(OutputKind::Models, "models")]
    #[case(OutputKind::RawModels, "raw_models")]
    #[case(OutputKind::ExtendedModels, "extended_models")]
    fn test_kind_names(#[case] kind: OutputKind, #[case] name: &str) {
        assert_eq!(kind.dir_name(), name);
        assert_eq!(name.parse::<OutputKind>().unwrap(), kind);
    }

    #[test]
    fn test_artifact_path_layout() {
        let store = ArtifactStore::new("data");
        let context = ModelContext::new("XGB", "BTC", "1h");
        assert_eq!(
            store.artifact_path(OutputKind::RawModels, &context, ArtifactRole::Pred, 3),
            PathBuf::from("data/raw_models/XGB/BTC/1h/pred_3.csv")
        );
    }

    #[test]
    fn test_write_period_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let context = ModelContext::new("ARIMA", "ETH", "1d");
        let train = series(20, 0, &["open", "close"]);
        let test = series(5, 20, &["open", "close"]);
        let prediction = series(5, 20, &["close"]);

        store
            .write_period(
                OutputKind::Models,
                &context,
                0,
                &ForecastArtifact {
                    prediction: &prediction,
                    train: &train,
                    test: &test,
                },
            )
            .unwrap();

        for role in ArtifactRole::ALL {
            assert!(store.has_artifact(OutputKind::Models, &context, role, 0));
        }
        assert!(!store.has_artifact(OutputKind::Models, &context, ArtifactRole::Pred, 1));
        assert_eq!(
            store.read_artifact(OutputKind::Models, &context, ArtifactRole::Train, 0).unwrap(),
            train
        );
        assert_eq!(
            store.read_artifact(OutputKind::Models, &context, ArtifactRole::Pred, 0).unwrap(),
            prediction
        );

        // Only the three artifacts remain, no staging files
        let files = fs::read_dir(store.cell_dir(OutputKind::Models, &context)).unwrap().count();
        assert_eq!(files, 3);
    }

    #[test]
    fn test_csv_layout() {
        let mut buffer = Vec::new();
        write_series(&mut buffer, &series(2, 0, &["close"])).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "time,close\n2023-03-01 00:00:00,100\n2023-03-01 01:00:00,100.25\n"
        );
    }

    #[test]
    fn test_rewrite_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let context = ModelContext::new("RNN", "BTC", "1m");
        let first = series(4, 0, &["close"]);
        let second = series(2, 10, &["close"]);
        for part in [&first, &second] {
            store
                .write_period(
                    OutputKind::RawModels,
                    &context,
                    2,
                    &ForecastArtifact {
                        prediction: part,
                        train: part,
                        test: part,
                    },
                )
                .unwrap();
        }
        let read = store
            .read_artifact(OutputKind::RawModels, &context, ArtifactRole::Test, 2)
            .unwrap();
        assert_eq!(read, second);
    }
}
