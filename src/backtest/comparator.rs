//! Strategy Comparator
//!
//! Runs multiple strategies on the same candles and compares results. Each run
//! owns its ledger, so the runs execute in parallel.

use super::engine::{BacktestEngine, BacktestResult};
use crate::data::CandleSeries;
use crate::strategy::Strategy;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Result of comparing multiple strategies
#[derive(Debug)]
pub struct ComparisonResult {
    pub candles_count: usize,
    /// Successful runs, best cumulative return first
    pub results: Vec<BacktestResult>,
    /// Strategies whose run failed, with the error message
    pub failures: Vec<(String, String)>,
}

impl ComparisonResult {
    /// Get the best strategy by cumulative return
    pub fn best_by_return(&self) -> Option<&BacktestResult> {
        self.results
            .iter()
            .filter(|r| !r.metrics.cumulative_return.is_nan())
            .max_by(|a, b| {
                a.metrics
                    .cumulative_return
                    .partial_cmp(&b.metrics.cumulative_return)
                    .unwrap_or(Ordering::Equal)
            })
    }

    /// Get the best strategy by Sharpe ratio
    pub fn best_by_sharpe(&self) -> Option<&BacktestResult> {
        self.results
            .iter()
            .filter(|r| !r.metrics.sharpe_ratio.is_nan())
            .max_by(|a, b| {
                a.metrics
                    .sharpe_ratio
                    .partial_cmp(&b.metrics.sharpe_ratio)
                    .unwrap_or(Ordering::Equal)
            })
    }

    /// Export results to CSV. Undefined metrics are written as empty cells.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref()).context("Failed to create CSV file")?;
        self.write_csv(file)
    }

    fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        writer.write_record([
            "strategy",
            "positions",
            "open_positions",
            "cumulative_return",
            "annualized_return",
            "sharpe_ratio",
            "sortino_ratio",
            "win_rate",
            "total_pnl",
        ])?;

        for result in &self.results {
            let m = &result.metrics;
            writer.write_record([
                result.strategy.clone(),
                m.total_positions.to_string(),
                result.open_positions().to_string(),
                format_cell(m.cumulative_return),
                format_cell(m.annualized_return),
                format_cell(m.sharpe_ratio),
                format_cell(m.sortino_ratio),
                format_cell(m.win_rate),
                m.total_pnl.map(|p| p.to_string()).unwrap_or_default(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn format_cell(value: f64) -> String {
    if value.is_finite() {
        format!("{:.6}", value)
    } else {
        String::new()
    }
}

/// Compare strategies on the same data
pub fn compare_strategies(
    series: &CandleSeries,
    strategies: &[Box<dyn Strategy>],
    engine: &BacktestEngine,
) -> ComparisonResult {
    info!(
        "Comparing {} strategies over {} candles",
        strategies.len(),
        series.len()
    );

    let outcomes: Vec<(String, crate::error::Result<BacktestResult>)> = strategies
        .par_iter()
        .map(|strategy| {
            (
                strategy.name().to_string(),
                engine.run(series, strategy.as_ref()),
            )
        })
        .collect();

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                info!(
                    "  {}: {} positions, {:.2}% cumulative return",
                    name, result.metrics.total_positions, result.metrics.cumulative_return
                );
                results.push(result);
            }
            Err(e) => {
                warn!("  {} failed: {}", name, e);
                failures.push((name, e.to_string()));
            }
        }
    }

    // Best first, undefined returns last
    results.sort_by(|a, b| {
        let (a, b) = (a.metrics.cumulative_return, b.metrics.cumulative_return);
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        }
    });

    ComparisonResult {
        candles_count: series.len(),
        results,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{Direction, PositionLedger};
    use crate::data::Candle;
    use crate::strategy::{strategy_fn, Signal};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn series() -> CandleSeries {
        let candles = [100, 110, 90, 120]
            .iter()
            .enumerate()
            .map(|(i, price)| {
                Candle::new(
                    Utc.timestamp_millis_opt(i as i64 * 86_400_000).unwrap(),
                    Decimal::from(*price),
                )
            })
            .collect();
        CandleSeries::new(candles).unwrap()
    }

    /// Long on the first bar, short on bar `exit_bar`
    fn round_trip(name: &str, exit_bar: usize) -> Box<dyn Strategy> {
        Box::new(strategy_fn(name, move |window: &[Candle], _: &PositionLedger| {
            Ok(match window.len() {
                1 => Signal::at_last_open(Direction::Long, window),
                n if n == exit_bar => Signal::at_last_open(Direction::Short, window),
                _ => None,
            })
        }))
    }

    fn idle() -> Box<dyn Strategy> {
        Box::new(strategy_fn("idle", |_: &[Candle], _: &PositionLedger| Ok(None)))
    }

    #[test]
    fn test_results_sorted_and_failures_kept() {
        let strategies = vec![
            round_trip("loser", 3),
            idle(),
            round_trip("winner", 4),
            Box::new(strategy_fn("broken", |_: &[Candle], _: &PositionLedger| {
                Err(anyhow::anyhow!("boom"))
            })),
        ];

        let comparison = compare_strategies(&series(), &strategies, &BacktestEngine::default());

        let order: Vec<&str> = comparison
            .results
            .iter()
            .map(|r| r.strategy.as_str())
            .collect();
        assert_eq!(order, vec!["winner", "loser", "idle"]);
        assert_eq!(comparison.failures.len(), 1);
        assert_eq!(comparison.failures[0].0, "broken");
        assert_eq!(comparison.best_by_return().unwrap().strategy, "winner");
        assert_eq!(comparison.candles_count, 4);
    }

    #[test]
    fn test_csv_leaves_undefined_cells_empty() {
        let strategies = vec![idle()];
        let comparison = compare_strategies(&series(), &strategies, &BacktestEngine::default());

        let mut buffer = Vec::new();
        comparison.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let rows: Vec<&str> = text.lines().collect();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("strategy,positions"));
        assert_eq!(rows[1], "idle,0,0,,,,,,0");
        assert!(comparison.best_by_sharpe().is_none());
    }
}
