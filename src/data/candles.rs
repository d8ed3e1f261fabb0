use crate::error::{BacktestError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Flat bar where every price equals `price`
    pub fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
        }
    }

    fn negative_field(&self) -> Option<&'static str> {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
        .into_iter()
        .find(|(_, value)| *value < Decimal::ZERO)
        .map(|(name, _)| name)
    }
}

/// Immutable, strictly time-ordered sequence of candles. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validate and wrap candles. The series is not re-sorted: out of order or
    /// duplicate timestamps are rejected.
    pub fn new(candles: Vec<Candle>) -> Result<Self> {
        if candles.is_empty() {
            return Err(BacktestError::malformed("candle series is empty"));
        }

        for (i, candle) in candles.iter().enumerate() {
            if let Some(field) = candle.negative_field() {
                return Err(BacktestError::malformed(format!(
                    "candle {} has negative {}",
                    i + 1,
                    field
                )));
            }
        }

        if let Some(i) = candles
            .windows(2)
            .position(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(BacktestError::malformed(format!(
                "timestamps not strictly increasing at candle {} ({} after {})",
                i + 2,
                candles[i + 1].timestamp,
                candles[i].timestamp
            )));
        }

        Ok(Self { candles })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    /// Prefix of the first `len` candles, clamped to the series length
    pub fn window(&self, len: usize) -> &[Candle] {
        &self.candles[..len.min(self.candles.len())]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn first(&self) -> &Candle {
        &self.candles[0]
    }

    pub fn last(&self) -> &Candle {
        &self.candles[self.candles.len() - 1]
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}
