//! Backtest engine for replaying candle history through a strategy

use super::ledger::PositionLedger;
use super::metrics::{MetricsCalculator, PerformanceMetrics};
use crate::config::BacktestSettings;
use crate::data::CandleSeries;
use crate::error::{BacktestError, Result};
use crate::strategy::{Signal, Strategy};
use anyhow::anyhow;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Result of a backtest run
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy: String,
    pub metrics: PerformanceMetrics,
    pub ledger: PositionLedger,
}

impl BacktestResult {
    pub fn into_parts(self) -> (PerformanceMetrics, PositionLedger) {
        (self.metrics, self.ledger)
    }

    /// Positions still open when the data ran out, excluded from the metrics
    pub fn open_positions(&self) -> usize {
        self.ledger.open_positions().count()
    }
}

/// What the engine did with a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Opened(usize),
    Closed(usize),
}

/// Main backtest engine
#[derive(Debug, Clone, Default)]
pub struct BacktestEngine {
    calculator: MetricsCalculator,
}

impl BacktestEngine {
    pub fn new(calculator: MetricsCalculator) -> Self {
        Self { calculator }
    }

    pub fn from_settings(settings: &BacktestSettings) -> Self {
        Self::new(MetricsCalculator::new(
            settings.risk_free_rate,
            settings.trading_days,
        ))
    }

    /// Replay `series` bar by bar with a growing window.
    ///
    /// A signal first closes the newest open position of the opposite
    /// direction at the current bar's open. Only when there is none does it
    /// open a new position from the signal as given, so repeated same-direction
    /// signals stack extra positions. A strategy error aborts the run.
    pub fn run(&self, series: &CandleSeries, strategy: &dyn Strategy) -> Result<BacktestResult> {
        info!(
            "Starting backtest of {} over {} candles ({} → {})",
            strategy.name(),
            series.len(),
            series.first().timestamp,
            series.last().timestamp
        );

        let mut ledger = PositionLedger::new();

        for bar in 1..=series.len() {
            let window = series.window(bar);

            let signal = strategy
                .evaluate(window, &ledger)
                .and_then(|signal| signal.map(validate).transpose())
                .map_err(|source| BacktestError::StrategyExecution { bar, source })?;

            if let Some(signal) = signal {
                let current = &window[bar - 1];
                let action = apply_signal(&mut ledger, &signal, current.timestamp, current.open)
                    .map_err(|source| BacktestError::StrategyExecution { bar, source })?;
                match action {
                    Action::Opened(id) => debug!(
                        "bar {}: opened {} #{} @ {}",
                        bar, signal.direction, id, signal.price
                    ),
                    Action::Closed(id) => debug!(
                        "bar {}: closed #{} @ {} on {} signal",
                        bar, id, current.open, signal.direction
                    ),
                }
            }
        }

        let metrics = self.calculator.compute(ledger.closed_positions());

        info!(
            "Backtest complete: {} closed, {} still open, {:.2}% cumulative return",
            metrics.total_positions,
            ledger.open_positions().count(),
            metrics.cumulative_return
        );

        Ok(BacktestResult {
            strategy: strategy.name().to_string(),
            metrics,
            ledger,
        })
    }
}

fn validate(signal: Signal) -> anyhow::Result<Signal> {
    if signal.price < Decimal::ZERO {
        return Err(anyhow!("signal price {} is negative", signal.price));
    }
    Ok(signal)
}

fn apply_signal(
    ledger: &mut PositionLedger,
    signal: &Signal,
    time: chrono::DateTime<chrono::Utc>,
    open: Decimal,
) -> anyhow::Result<Action> {
    if let Some(closed) = ledger.close_latest(signal.direction.opposite(), time, open)? {
        return Ok(Action::Closed(closed.id));
    }
    Ok(Action::Opened(ledger.open(signal).id))
}
