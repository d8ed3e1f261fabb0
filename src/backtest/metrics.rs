//! Performance metrics calculation for backtesting
//!
//! Ratios are `f64` and follow NaN propagation: any metric whose denominator
//! is zero (no closed positions, zero entry sum, zero-day span, zero variance,
//! no losing trades for Sortino) is `f64::NAN` rather than an error or ±inf.
//! Aggregates over prices are taken in `f64`, so large but valid prices never
//! overflow the `Decimal` range mid-report.

use super::ledger::Position;
use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

/// Performance metrics computed from closed positions
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    /// 100 * total P&L / total entry price
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Fraction of closed positions with positive P&L
    pub win_rate: f64,
    pub total_positions: usize,

    /// Sum of realized P&L. `None` if the sum exceeds the `Decimal` range.
    pub total_pnl: Option<Decimal>,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub profit_factor: f64,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    #[serde(serialize_with = "serialize_duration_secs")]
    pub avg_holding_period: Option<Duration>,
}

impl PerformanceMetrics {
    /// Metric name → value, in report order
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("Cumulative Return", self.cumulative_return),
            ("Annualized Return", self.annualized_return),
            ("Sharpe Ratio", self.sharpe_ratio),
            ("Sortino Ratio", self.sortino_ratio),
            ("Win Rate", self.win_rate),
            ("Number of positions", self.total_positions as f64),
        ]
    }
}

fn serialize_duration_secs<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(duration) => serializer.serialize_some(&duration.num_seconds()),
        None => serializer.serialize_none(),
    }
}

/// Turns a set of closed positions into [`PerformanceMetrics`]. Pure: the
/// same positions always give the same report.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCalculator {
    /// Annual risk-free rate, spread evenly over `trading_days`
    pub risk_free_rate: f64,
    pub trading_days: u32,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.01,
            trading_days: 252,
        }
    }
}

impl MetricsCalculator {
    pub fn new(risk_free_rate: f64, trading_days: u32) -> Self {
        Self {
            risk_free_rate,
            trading_days,
        }
    }

    /// Compute the report. Open positions in the input are skipped.
    pub fn compute<'a, I>(&self, positions: I) -> PerformanceMetrics
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let closed: Vec<(&Position, Decimal)> = positions
            .into_iter()
            .filter_map(|p| p.realized_pnl.map(|pnl| (p, pnl)))
            .collect();

        let total_positions = closed.len();
        let pnls: Vec<Decimal> = closed.iter().map(|(_, pnl)| *pnl).collect();
        let returns: Vec<f64> = closed
            .iter()
            .map(|(p, _)| p.return_pct().unwrap_or(f64::NAN))
            .collect();

        let total_pnl = pnls
            .iter()
            .try_fold(Decimal::ZERO, |sum, pnl| sum.checked_add(*pnl));
        let pnl_sum: f64 = pnls.iter().map(|p| to_f64(*p)).sum();
        let total_entry: f64 = closed.iter().map(|(p, _)| to_f64(p.entry_price)).sum();

        let cumulative_return = 100.0 * ratio(pnl_sum, total_entry);
        let annualized_return = self.annualize(cumulative_return, &closed);

        let daily_rf = self.risk_free_rate / f64::from(self.trading_days);
        let sharpe_ratio = sharpe(&returns, daily_rf);
        let sortino_ratio = sortino(&returns, daily_rf);

        let wins: Vec<Decimal> = pnls.iter().copied().filter(|p| *p > Decimal::ZERO).collect();
        let losses: Vec<Decimal> = pnls.iter().copied().filter(|p| *p < Decimal::ZERO).collect();
        let win_rate = ratio(wins.len() as f64, total_positions as f64);

        let gross_profit: f64 = wins.iter().map(|p| to_f64(*p)).sum();
        let gross_loss: f64 = losses.iter().map(|p| to_f64(*p)).sum();
        let profit_factor = ratio(gross_profit, gross_loss.abs());

        let avg_holding_period = if total_positions == 0 {
            None
        } else {
            let total_secs: i64 = closed
                .iter()
                .filter_map(|(p, _)| p.holding_period())
                .map(|d| d.num_seconds())
                .sum();
            Some(Duration::seconds(total_secs / total_positions as i64))
        };

        PerformanceMetrics {
            cumulative_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            win_rate,
            total_positions,
            total_pnl,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            profit_factor,
            largest_win: wins.iter().max().copied().unwrap_or(Decimal::ZERO),
            largest_loss: losses.iter().min().copied().unwrap_or(Decimal::ZERO),
            avg_holding_period,
        }
    }

    /// `(1 + cumulative_return)^(trading_days / span_days) - 1`, where the span
    /// is the whole number of days from the first entry to the last exit.
    fn annualize(&self, cumulative_return: f64, closed: &[(&Position, Decimal)]) -> f64 {
        let first_entry = closed.iter().map(|(p, _)| p.entry_time).min();
        let last_exit = closed.iter().filter_map(|(p, _)| p.exit_time).max();

        let span_days = match (first_entry, last_exit) {
            (Some(start), Some(end)) => (end - start).num_days(),
            _ => return f64::NAN,
        };
        if span_days == 0 {
            return f64::NAN;
        }

        let exponent = f64::from(self.trading_days) / span_days as f64;
        (1.0 + cumulative_return).powf(exponent) - 1.0
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Division that yields NaN instead of ±inf on a zero denominator
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

fn mean(values: &[f64]) -> f64 {
    ratio(values.iter().sum(), values.len() as f64)
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    mean(&values.iter().map(|v| (v - m).powi(2)).collect::<Vec<_>>()).sqrt()
}

fn sharpe(returns: &[f64], daily_rf: f64) -> f64 {
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    ratio(mean(&excess), std_dev(&excess))
}

/// Downside deviation is the root mean square of the losing returns only
fn sortino(returns: &[f64], daily_rf: f64) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_risk = mean(&downside.iter().map(|r| r * r).collect::<Vec<_>>()).sqrt();
    ratio(mean(returns) - daily_rf, downside_risk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::Direction;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_704_067_200_000 + n * 86_400_000).unwrap()
    }

    fn closed(
        id: usize,
        direction: Direction,
        entry: (i64, Decimal),
        exit: (i64, Decimal),
    ) -> Position {
        let pnl = (exit.1 - entry.1) * Decimal::from(direction.sign());
        Position {
            id,
            direction,
            entry_time: day(entry.0),
            entry_price: entry.1,
            exit_time: Some(day(exit.0)),
            exit_price: Some(exit.1),
            realized_pnl: Some(pnl),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_set_is_undefined() {
        let metrics = MetricsCalculator::default().compute(&Vec::<Position>::new());
        assert_eq!(metrics.total_positions, 0);
        assert!(metrics.cumulative_return.is_nan());
        assert!(metrics.annualized_return.is_nan());
        assert!(metrics.sharpe_ratio.is_nan());
        assert!(metrics.sortino_ratio.is_nan());
        assert!(metrics.win_rate.is_nan());
        assert!(metrics.profit_factor.is_nan());
        assert_eq!(metrics.total_pnl, Some(Decimal::ZERO));
        assert_eq!(metrics.avg_holding_period, None);
    }

    #[test]
    fn test_two_trade_report() {
        // +10% long over 2 days, -5% short over 1 day
        let positions = vec![
            closed(1, Direction::Long, (0, dec!(100)), (2, dec!(110))),
            closed(2, Direction::Short, (3, dec!(200)), (4, dec!(210))),
        ];
        let metrics = MetricsCalculator::default().compute(&positions);

        assert_eq!(metrics.total_positions, 2);
        assert_eq!(metrics.total_pnl, Some(dec!(0)));
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.losing_trades, 1);
        assert!(approx(metrics.win_rate, 0.5));
        assert!(approx(metrics.cumulative_return, 0.0));
        assert!(approx(metrics.annualized_return, 0.0));
        assert!(approx(metrics.profit_factor, 1.0));
        assert_eq!(metrics.largest_win, dec!(10));
        assert_eq!(metrics.largest_loss, dec!(-10));
        assert_eq!(metrics.avg_holding_period, Some(Duration::hours(36)));

        let rf = 0.01 / 252.0;
        // returns 0.10 and -0.05: mean 0.025, population std 0.075
        assert!(approx(metrics.sharpe_ratio, (0.025 - rf) / 0.075));
        // downside risk = sqrt(0.05^2) = 0.05
        assert!(approx(metrics.sortino_ratio, (0.025 - rf) / 0.05));
    }

    #[test]
    fn test_annualized_return_uses_whole_days() {
        // cumulative return 5 (%), span 2.5 days -> 2 whole days
        let mut position = closed(1, Direction::Long, (0, dec!(100)), (2, dec!(105)));
        position.exit_time = Some(day(2) + Duration::hours(12));
        let metrics = MetricsCalculator::default().compute([&position]);
        assert!(approx(metrics.cumulative_return, 5.0));
        let expected = 6f64.powf(126.0) - 1.0;
        assert!((metrics.annualized_return / expected - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_day_trade_has_undefined_annualized_return() {
        let mut position = closed(1, Direction::Long, (0, dec!(100)), (0, dec!(105)));
        position.exit_time = Some(day(0) + Duration::hours(3));
        let metrics = MetricsCalculator::default().compute([&position]);
        assert!(metrics.annualized_return.is_nan());
        assert!(approx(metrics.win_rate, 1.0));
    }

    #[test]
    fn test_zero_variance_and_no_losses_are_undefined() {
        let positions = vec![
            closed(1, Direction::Long, (0, dec!(100)), (1, dec!(110))),
            closed(2, Direction::Long, (1, dec!(100)), (2, dec!(110))),
        ];
        let metrics = MetricsCalculator::default().compute(&positions);
        assert!(metrics.sharpe_ratio.is_nan());
        assert!(metrics.sortino_ratio.is_nan());
        assert!(metrics.profit_factor.is_nan());
        assert!(approx(metrics.win_rate, 1.0));
    }

    #[test]
    fn test_open_positions_are_skipped() {
        let mut open = closed(2, Direction::Long, (0, dec!(50)), (1, dec!(60)));
        open.exit_time = None;
        open.exit_price = None;
        open.realized_pnl = None;
        let positions = vec![
            closed(1, Direction::Long, (0, dec!(100)), (1, dec!(90))),
            open,
        ];
        let metrics = MetricsCalculator::default().compute(&positions);
        assert_eq!(metrics.total_positions, 1);
        assert!(approx(metrics.cumulative_return, -10.0));
        assert!(approx(metrics.win_rate, 0.0));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let positions = vec![
            closed(1, Direction::Long, (0, dec!(100)), (3, dec!(104))),
            closed(2, Direction::Short, (1, dec!(50)), (5, dec!(47))),
            closed(3, Direction::Long, (2, dec!(80)), (9, dec!(76))),
        ];
        let calculator = MetricsCalculator::default();
        let first = calculator.compute(&positions);
        let second = calculator.compute(&positions);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.entries(), second.entries());
    }

    #[test]
    fn test_nan_serializes_as_null() {
        let metrics = MetricsCalculator::default().compute(&Vec::<Position>::new());
        let json = serde_json::to_value(&metrics).unwrap();
        assert!(json["sharpe_ratio"].is_null());
        assert_eq!(json["total_positions"], 0);
    }

    #[test]
    fn test_zero_entry_price_makes_ratios_undefined() {
        let positions = vec![
            closed(1, Direction::Long, (0, dec!(0)), (1, dec!(5))),
            closed(2, Direction::Long, (1, dec!(10)), (2, dec!(8))),
        ];
        let metrics = MetricsCalculator::default().compute(&positions);
        assert!(metrics.sharpe_ratio.is_nan());
        assert!(metrics.sortino_ratio.is_nan());
        assert!(approx(metrics.cumulative_return, 30.0));
        assert_eq!(metrics.total_pnl, Some(dec!(3)));
    }
}
