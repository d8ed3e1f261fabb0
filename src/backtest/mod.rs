//! Backtesting module for historical candle replay and strategy evaluation

mod comparator;
mod engine;
mod ledger;
mod loader;
mod metrics;

pub use comparator::{compare_strategies, ComparisonResult};
pub use engine::{BacktestEngine, BacktestResult};
pub use ledger::{Direction, Position, PositionLedger};
pub use loader::{DataLoader, REQUIRED_COLUMNS};
pub use metrics::{MetricsCalculator, PerformanceMetrics};

use crate::config::BacktestSettings;
use crate::error::Result;
use crate::strategy::Strategy;
use std::path::Path;

/// Load a candle file and replay it through `strategy` with the default
/// risk-free rate and trading-day count.
pub fn run_backtest<P: AsRef<Path>>(
    path: P,
    strategy: &dyn Strategy,
) -> Result<(PerformanceMetrics, PositionLedger)> {
    run_backtest_with(path, strategy, &BacktestSettings::default())
}

pub fn run_backtest_with<P: AsRef<Path>>(
    path: P,
    strategy: &dyn Strategy,
    settings: &BacktestSettings,
) -> Result<(PerformanceMetrics, PositionLedger)> {
    let series = DataLoader::load(path)?;
    let result = BacktestEngine::from_settings(settings).run(&series, strategy)?;
    Ok(result.into_parts())
}
