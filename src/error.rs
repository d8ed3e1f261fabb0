//! Error types surfaced by the backtesting core

use thiserror::Error;

/// Failure of a backtest run. Undefined ratios are not errors; they show up
/// as NaN in the report.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// Missing columns, unparsable or non-finite values, negative prices,
    /// unordered timestamps, or values outside the `Decimal` range
    #[error("malformed candle data: {reason}")]
    MalformedData { reason: String },

    #[error("strategy failed at bar {bar}: {source}")]
    StrategyExecution {
        /// 1-based replay index (window length) at which the callback failed
        bar: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read candle file: {0}")]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        BacktestError::MalformedData {
            reason: reason.into(),
        }
    }

    pub fn is_malformed_data(&self) -> bool {
        matches!(self, BacktestError::MalformedData { .. })
    }

    pub fn is_strategy_failure(&self) -> bool {
        matches!(self, BacktestError::StrategyExecution { .. })
    }
}

pub type Result<T> = std::result::Result<T, BacktestError>;
