//! Data loader for candle CSV files produced by the historical data download

use crate::data::{Candle, CandleSeries};
use crate::error::{BacktestError, Result};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Columns every candle file must carry. Other columns are ignored.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "start",
    "fillLow",
    "fillHigh",
    "fillOpen",
    "fillClose",
    "baseVolume",
];

#[derive(Debug, Deserialize)]
struct CandleRecord {
    start: i64,
    #[serde(rename = "fillLow")]
    low: f64,
    #[serde(rename = "fillHigh")]
    high: f64,
    #[serde(rename = "fillOpen")]
    open: f64,
    #[serde(rename = "fillClose")]
    close: f64,
    #[serde(rename = "baseVolume")]
    volume: f64,
}

/// Loader for candle CSV files
pub struct DataLoader;

impl DataLoader {
    /// Load and validate a candle file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<CandleSeries> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let series = Self::load_from_reader(file).map_err(|e| match e {
            BacktestError::MalformedData { reason } => {
                BacktestError::malformed(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })?;

        info!(
            "Loaded {} candles from {} ({} → {})",
            series.len(),
            path.display(),
            series.first().timestamp,
            series.last().timestamp
        );
        Ok(series)
    }

    /// Parse candles from any CSV source with a header row
    pub fn load_from_reader<R: Read>(reader: R) -> Result<CandleSeries> {
        let mut reader = csv::Reader::from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| BacktestError::malformed(format!("unreadable header row: {}", e)))?
            .clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h.trim() == *column) {
                return Err(BacktestError::malformed(format!("missing {} column", column)));
            }
        }

        let mut candles = Vec::new();
        for (i, row) in reader.deserialize::<CandleRecord>().enumerate() {
            let row_number = i + 1;
            let record =
                row.map_err(|e| BacktestError::malformed(format!("row {}: {}", row_number, e)))?;
            candles.push(record_to_candle(record, row_number)?);
        }

        if candles.is_empty() {
            return Err(BacktestError::malformed("file contains no candles"));
        }

        debug!("Parsed {} candle rows", candles.len());
        CandleSeries::new(candles)
    }
}

fn record_to_candle(record: CandleRecord, row: usize) -> Result<Candle> {
    Ok(Candle {
        timestamp: to_timestamp(record.start, row)?,
        open: to_decimal(record.open, "fillOpen", row)?,
        high: to_decimal(record.high, "fillHigh", row)?,
        low: to_decimal(record.low, "fillLow", row)?,
        close: to_decimal(record.close, "fillClose", row)?,
        volume: to_decimal(record.volume, "baseVolume", row)?,
    })
}

fn to_timestamp(start_ms: i64, row: usize) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(start_ms).single().ok_or_else(|| {
        BacktestError::malformed(format!("row {}: start {} out of range", row, start_ms))
    })
}

/// Prices and volumes are held as `Decimal`: magnitudes above `Decimal::MAX`
/// (about 7.9e28) are rejected, and values finer than 28 decimal places are
/// rounded, so anything below 1e-28 is read as zero.
fn to_decimal(value: f64, column: &str, row: usize) -> Result<Decimal> {
    if !value.is_finite() {
        return Err(BacktestError::malformed(format!(
            "row {}: {} is not finite ({})",
            row, column, value
        )));
    }
    Decimal::try_from(value).map_err(|_| {
        BacktestError::malformed(format!(
            "row {}: {} = {} is outside the Decimal range",
            row, column, value
        ))
    })
}
