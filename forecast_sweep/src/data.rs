//! Time series data handling for backtesting

use crate::error::{Result, SweepError};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Timestamp layout used for artifact files and accepted when loading
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An immutable, time-indexed table of `f64` components.
///
/// Timestamps are strictly increasing and evenly spaced at the sampling
/// interval, and every component has one value per timestamp.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    /// Spacing between consecutive timestamps, unknown below two rows
    interval: Option<Duration>,
    /// Component names, in column order
    columns: Vec<String>,
    /// Column-major values, `values[c][i]`
    values: Vec<Vec<f64>>,
}

impl TimeSeries {
    /// Create a series from timestamps and named component columns
    pub fn new(timestamps: Vec<DateTime<Utc>>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        if columns.is_empty() {
            return Err(SweepError::DataError(
                "A time series needs at least one component".to_string(),
            ));
        }

        let interval = sampling_interval(&timestamps)?;

        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            if column.len() != timestamps.len() {
                return Err(SweepError::DataError(format!(
                    "Column '{}' has {} values for {} timestamps",
                    name,
                    column.len(),
                    timestamps.len()
                )));
            }
            if names.contains(&name) {
                return Err(SweepError::DataError(format!("Duplicate column '{}'", name)));
            }
            names.push(name);
            values.push(column);
        }

        Ok(Self {
            timestamps,
            interval,
            columns: names,
            values,
        })
    }

    /// Create a single-component series
    pub fn univariate(name: &str, timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        Self::new(timestamps, vec![(name.to_string(), values)])
    }

    /// Get the length of the time series
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the time series is empty
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Sampling interval, kept by slices of the series
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Values of a named component
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| self.values[idx].as_slice())
    }

    /// All component values at row `index`, in column order
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.len() {
            return None;
        }
        Some(self.values.iter().map(|col| col[index]).collect())
    }

    /// Name of the component forecasters model: the first column whose name
    /// contains "close", otherwise the last column
    pub fn close_column(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.to_lowercase().contains("close"))
            .or_else(|| self.columns.last())
            .map(String::as_str)
            .unwrap_or("close")
    }

    /// Get the close values as a slice
    pub fn close_values(&self) -> &[f64] {
        self.column(self.close_column()).unwrap_or(&[])
    }

    /// Rows `start..end` as a new series
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.len() {
            return Err(SweepError::DataError(format!(
                "Slice {}..{} out of bounds for series of length {}",
                start,
                end,
                self.len()
            )));
        }

        Ok(Self {
            timestamps: self.timestamps[start..end].to_vec(),
            interval: self.interval,
            columns: self.columns.clone(),
            values: self.values.iter().map(|col| col[start..end].to_vec()).collect(),
        })
    }

    /// The first `n` rows (all rows when `n` exceeds the length)
    pub fn head(&self, n: usize) -> Self {
        let end = n.min(self.len());
        self.slice(0, end).unwrap_or_else(|_| self.clone())
    }

    /// The last `n` rows (all rows when `n` exceeds the length)
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        self.slice(start, self.len()).unwrap_or_else(|_| self.clone())
    }

    /// Everything except the last `n` rows
    pub fn drop_last(&self, n: usize) -> Result<Self> {
        if n > self.len() {
            return Err(SweepError::DataError(format!(
                "Cannot drop {} rows from a series of length {}",
                n,
                self.len()
            )));
        }
        self.slice(0, self.len() - n)
    }

    /// Append `other` after `self`; components and sampling intervals must
    /// match and `other` must start exactly one interval after `self` ends
    pub fn concat(&self, other: &TimeSeries) -> Result<Self> {
        if self.columns != other.columns {
            return Err(SweepError::DataError(format!(
                "Cannot concatenate series with components {:?} and {:?}",
                self.columns, other.columns
            )));
        }

        let mut interval = match (self.interval, other.interval) {
            (Some(a), Some(b)) if a != b => {
                return Err(SweepError::DataError(format!(
                    "Cannot concatenate series sampled every {} and every {}",
                    a, b
                )))
            }
            (a, b) => a.or(b),
        };

        if let (Some(last), Some(first)) = (self.last_timestamp(), other.first_timestamp()) {
            let step = first - last;
            if step <= Duration::zero() {
                return Err(SweepError::DataError(format!(
                    "Cannot concatenate: {} does not follow {}",
                    first, last
                )));
            }
            match interval {
                Some(expected) if step != expected => {
                    return Err(SweepError::DataError(format!(
                        "Cannot concatenate across a gap: {} -> {} is not one {} step",
                        last, first, expected
                    )));
                }
                Some(_) => {}
                None => interval = Some(step),
            }
        }

        let mut timestamps = self.timestamps.clone();
        timestamps.extend_from_slice(&other.timestamps);
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| {
                let mut joined = a.clone();
                joined.extend_from_slice(b);
                joined
            })
            .collect();

        Ok(Self {
            timestamps,
            interval,
            columns: self.columns.clone(),
            values,
        })
    }

    /// A single-component view of this series
    pub fn select(&self, name: &str) -> Result<Self> {
        let column = self.column(name).ok_or_else(|| {
            SweepError::DataError(format!(
                "Column '{}' not found (available: {:?})",
                name, self.columns
            ))
        })?;
        Ok(Self {
            timestamps: self.timestamps.clone(),
            interval: self.interval,
            columns: vec![name.to_string()],
            values: vec![column.to_vec()],
        })
    }
}

impl PartialEq for TimeSeries {
    fn eq(&self, other: &Self) -> bool {
        self.timestamps == other.timestamps
            && self.columns == other.columns
            && self.values == other.values
    }
}

/// Spacing of evenly sampled timestamps. Fails on timestamps that go
/// backwards or repeat, and on any step that differs from the first one.
fn sampling_interval(timestamps: &[DateTime<Utc>]) -> Result<Option<Duration>> {
    let Some(interval) = timestamps.get(1).zip(timestamps.first()).map(|(b, a)| *b - *a) else {
        return Ok(None);
    };

    for (pos, pair) in timestamps.windows(2).enumerate() {
        let step = pair[1] - pair[0];
        if step <= Duration::zero() {
            return Err(SweepError::DataError(format!(
                "Timestamps must be strictly increasing (at row {}: {} -> {})",
                pos, pair[0], pair[1]
            )));
        }
        if step != interval {
            return Err(SweepError::DataError(format!(
                "Gap in series at row {}: {} -> {} is not one {} step",
                pos, pair[0], pair[1], interval
            )));
        }
    }
    Ok(Some(interval))
}

/// Data loader for OHLCV files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load time series data from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(&df)
    }

    /// Create a time series from an existing DataFrame
    pub fn from_dataframe(df: &DataFrame) -> Result<TimeSeries> {
        let time_column = Self::detect_time_column(df)?;
        let mut value_columns = Self::detect_price_columns(df, &time_column)?;
        if let Some(volume) = Self::detect_volume_column(df, &time_column) {
            value_columns.push(volume);
        }

        let timestamps = Self::column_as_timestamps(df, &time_column)?;
        let mut columns = Vec::with_capacity(value_columns.len());
        for name in value_columns {
            let values = Self::column_as_f64(df, &name)?;
            columns.push((name.to_lowercase(), values));
        }

        TimeSeries::new(timestamps, columns)
    }

    /// Detect the time column in a DataFrame
    fn detect_time_column(df: &DataFrame) -> Result<String> {
        let column_names = df.get_column_names();

        for name in &column_names {
            let lower_name = name.to_lowercase();
            if lower_name.contains("time") || lower_name.contains("date") {
                return Ok(name.to_string());
            }
        }

        if let Some(first_col) = df.get_columns().first() {
            if first_col.dtype().is_temporal() {
                return Ok(first_col.name().to_string());
            }
        }

        Err(SweepError::DataError(
            "No time column found in data".to_string(),
        ))
    }

    /// Detect OHLC price columns, falling back to a lone "price" column
    fn detect_price_columns(df: &DataFrame, time_column: &str) -> Result<Vec<String>> {
        let column_names: Vec<&str> = df
            .get_column_names()
            .into_iter()
            .filter(|name| *name != time_column)
            .collect();
        let mut price_columns = Vec::new();

        for required in ["open", "high", "low", "close"] {
            if let Some(name) = column_names
                .iter()
                .find(|n| n.to_lowercase() == required)
                .or_else(|| column_names.iter().find(|n| n.to_lowercase().contains(required)))
            {
                price_columns.push(name.to_string());
            } else if required == "close" {
                if let Some(name) = column_names
                    .iter()
                    .find(|n| n.to_lowercase().contains("price"))
                {
                    price_columns.push(name.to_string());
                }
            }
        }

        if price_columns.is_empty() {
            return Err(SweepError::DataError(
                "No price columns found in data".to_string(),
            ));
        }

        Ok(price_columns)
    }

    /// Detect volume column in a DataFrame
    fn detect_volume_column(df: &DataFrame, time_column: &str) -> Option<String> {
        df.get_column_names()
            .into_iter()
            .filter(|name| *name != time_column)
            .find(|name| name.to_lowercase().contains("volume"))
            .map(str::to_string)
    }

    fn column_as_f64(df: &DataFrame, column_name: &str) -> Result<Vec<f64>> {
        let casted = df.column(column_name)?.cast(&DataType::Float64)?;
        casted
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| {
                    SweepError::DataError(format!(
                        "Missing value in column '{}' at row {}",
                        column_name, row
                    ))
                })
            })
            .collect()
    }

    /// Integers are read as epoch milliseconds, strings as dates or date-times
    fn column_as_timestamps(df: &DataFrame, column_name: &str) -> Result<Vec<DateTime<Utc>>> {
        let col = df.column(column_name)?;

        let parsed: Vec<Option<DateTime<Utc>>> = match col.dtype() {
            DataType::Datetime(unit, _) => {
                let divisor = match unit {
                    TimeUnit::Nanoseconds => 1_000_000,
                    TimeUnit::Microseconds => 1_000,
                    TimeUnit::Milliseconds => 1,
                };
                col.datetime()?
                    .into_iter()
                    .map(|ts| ts.and_then(|v| Utc.timestamp_millis_opt(v / divisor).single()))
                    .collect()
            }
            DataType::Date => col
                .date()?
                .into_iter()
                .map(|days| {
                    days.and_then(|d| {
                        NaiveDate::from_ymd_opt(1970, 1, 1)?
                            .checked_add_signed(chrono::Duration::days(d as i64))
                            .and_then(|date| date.and_hms_opt(0, 0, 0))
                            .map(|naive| Utc.from_utc_datetime(&naive))
                    })
                })
                .collect(),
            DataType::Utf8 => col
                .utf8()?
                .into_iter()
                .map(|s| s.and_then(parse_timestamp))
                .collect(),
            dtype if dtype.is_numeric() => {
                let casted = col.cast(&DataType::Int64)?;
                let millis: Vec<Option<DateTime<Utc>>> = casted
                    .i64()?
                    .into_iter()
                    .map(|ms| ms.and_then(|v| Utc.timestamp_millis_opt(v).single()))
                    .collect();
                millis
            }
            other => {
                return Err(SweepError::DataError(format!(
                    "Column '{}' of type {} cannot be used as time",
                    column_name, other
                )))
            }
        };

        parsed
            .into_iter()
            .enumerate()
            .map(|(row, ts)| {
                ts.ok_or_else(|| {
                    SweepError::DataError(format!(
                        "Invalid timestamp in column '{}' at row {}",
                        column_name, row
                    ))
                })
            })
            .collect()
    }
}

/// Parse the timestamp spellings found in exchange dumps and artifact files
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn hourly(n: usize, offset: i64) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| start + Duration::hours(offset + i as i64))
            .collect()
    }

    fn ramp(n: usize, offset: i64) -> TimeSeries {
        let values = (0..n).map(|i| (offset + i as i64) as f64).collect();
        TimeSeries::univariate("close", hourly(n, offset), values).unwrap()
    }

    #[test]
    fn test_rejects_unordered_timestamps() {
        let mut ts = hourly(3, 0);
        ts.swap(1, 2);
        assert!(TimeSeries::univariate("close", ts, vec![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_rejects_gaps_in_sampling() {
        let mut ts = hourly(6, 0);
        for t in ts.iter_mut().skip(3) {
            *t += Duration::hours(120);
        }
        let err = TimeSeries::univariate("close", ts, vec![1.0; 6]).unwrap_err();
        assert!(err.to_string().contains("Gap in series at row 2"), "{}", err);

        let series = ramp(4, 0);
        assert_eq!(series.interval(), Some(Duration::hours(1)));
        assert_eq!(series.tail(1).interval(), Some(Duration::hours(1)));
        assert_eq!(ramp(1, 0).interval(), None);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        assert!(TimeSeries::univariate("close", hourly(3, 0), vec![1.0]).is_err());
    }

    #[test]
    fn test_slice_head_tail_drop() {
        let series = ramp(10, 0);
        assert_eq!(series.slice(2, 5).unwrap().close_values(), &[2.0, 3.0, 4.0]);
        assert_eq!(series.head(3).len(), 3);
        assert_eq!(series.tail(2).close_values(), &[8.0, 9.0]);
        assert_eq!(series.drop_last(4).unwrap().len(), 6);
        assert!(series.drop_last(11).is_err());
        assert!(series.slice(5, 11).is_err());
    }

    #[test]
    fn test_concat_requires_increasing_seam() {
        let first = ramp(5, 0);
        let second = ramp(5, 5);
        let joined = first.concat(&second).unwrap();
        assert_eq!(joined.len(), 10);
        assert_eq!(joined.close_values()[5], 5.0);

        assert!(second.concat(&first).is_err());
        assert!(first.concat(&first).is_err());
    }

    #[test]
    fn test_concat_rejects_gapped_seam() {
        let first = ramp(5, 0);
        assert!(first.concat(&ramp(5, 125)).is_err());

        // Single rows take their spacing from the other side
        assert!(first.tail(1).concat(&ramp(1, 5)).is_ok());
        assert!(first.tail(1).concat(&ramp(1, 7)).is_err());
        let pair = ramp(1, 0).concat(&ramp(1, 3)).unwrap();
        assert_eq!(pair.interval(), Some(Duration::hours(3)));

        let start = Utc.with_ymd_and_hms(2023, 1, 1, 5, 0, 0).unwrap();
        let daily = (0..3).map(|i| start + Duration::days(i)).collect();
        let daily = TimeSeries::univariate("close", daily, vec![1.0, 2.0, 3.0]).unwrap();
        assert!(first.concat(&daily).is_err());
    }

    #[test]
    fn test_close_column_detection() {
        let series = TimeSeries::new(
            hourly(2, 0),
            vec![
                ("open".to_string(), vec![1.0, 2.0]),
                ("close".to_string(), vec![3.0, 4.0]),
                ("volume".to_string(), vec![5.0, 6.0]),
            ],
        )
        .unwrap();
        assert_eq!(series.close_column(), "close");
        assert_eq!(series.close_values(), &[3.0, 4.0]);
        assert_eq!(series.row(1), Some(vec![2.0, 4.0, 6.0]));

        let raw = series.select("close").unwrap();
        assert_eq!(raw.columns(), &["close".to_string()]);
        assert!(series.select("missing").is_err());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2023-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-02T03:04:05Z"), Some(expected));
        assert_eq!(
            parse_timestamp("2023-01-02"),
            Some(Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_data_loader_from_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "date,open,high,low,close,volume").unwrap();
        writeln!(file, "2023-01-01,100.0,105.0,98.0,103.0,1000").unwrap();
        writeln!(file, "2023-01-02,103.0,107.0,101.0,106.0,1200").unwrap();
        writeln!(file, "2023-01-03,106.0,110.0,104.0,108.0,1500").unwrap();

        let data = DataLoader::from_csv(file.path()).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(
            data.columns(),
            &["open", "high", "low", "close", "volume"].map(String::from)
        );
        assert_eq!(data.close_values(), &[103.0, 106.0, 108.0]);
    }

    #[test]
    fn test_data_loader_epoch_millis() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "open_time,close").unwrap();
        writeln!(file, "1672531200000,10.5").unwrap();
        writeln!(file, "1672534800000,11.0").unwrap();

        let data = DataLoader::from_csv(file.path()).unwrap();
        assert_eq!(
            data.first_timestamp(),
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(data.columns(), &["close".to_string()]);
    }

    #[test]
    fn test_data_loader_rejects_missing_candles() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "date,close").unwrap();
        writeln!(file, "2023-01-01,100.0").unwrap();
        writeln!(file, "2023-01-02,101.0").unwrap();
        writeln!(file, "2023-01-05,102.0").unwrap();

        match DataLoader::from_csv(file.path()) {
            Err(SweepError::DataError(msg)) => assert!(msg.contains("Gap"), "{}", msg),
            other => panic!("expected a data error, got {:?}", other),
        }
    }

    #[test]
    fn test_data_loader_error_handling() {
        assert!(DataLoader::from_csv("nonexistent_file.csv").is_err());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid,csv,format").unwrap();
        writeln!(file, "1,2,3").unwrap();
        assert!(DataLoader::from_csv(file.path()).is_err());
    }
}
