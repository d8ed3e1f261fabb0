//! Moving Average Crossover Strategy
//!
//! Goes long on a golden cross (fast SMA of opens crosses above slow SMA) and
//! short on a death cross. The engine turns an opposite signal into a close of
//! the latest open position, so alternating crosses flip in and out of trades.
//!
//! Evaluation starts once the window holds `slow_period` bars. On that first
//! bar the previous slow average covers only the `slow_period - 1` earlier
//! bars.

use crate::backtest::{Direction, PositionLedger};
use crate::config::MaCrossoverConfig;
use crate::data::Candle;
use crate::strategy::base::{Signal, Strategy};
use crate::strategy::indicators::{crossed_above, crossed_below, opens, sma};
use anyhow::{anyhow, ensure, Result};
use rust_decimal::Decimal;
use tracing::debug;

pub struct MaCrossoverStrategy {
    config: MaCrossoverConfig,
}

impl MaCrossoverStrategy {
    pub fn new(config: MaCrossoverConfig) -> Self {
        Self { config }
    }
}

impl Strategy for MaCrossoverStrategy {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn evaluate(&self, window: &[Candle], _ledger: &PositionLedger) -> Result<Option<Signal>> {
        let MaCrossoverConfig {
            fast_period,
            slow_period,
        } = self.config;
        ensure!(
            fast_period > 0 && fast_period < slow_period,
            "fast period {} must be positive and shorter than slow period {}",
            fast_period,
            slow_period
        );

        if window.len() < slow_period {
            return Ok(None);
        }

        let prices = opens(window);
        let current = prices.as_slice();
        let previous = &current[..current.len() - 1];
        let average = |values: &[Decimal], period: usize| {
            sma(values, period.min(values.len()))
                .ok_or_else(|| anyhow!("{}-bar average of opens is out of range", period))
        };

        let fast_curr = average(current, fast_period)?;
        let slow_curr = average(current, slow_period)?;
        let fast_prev = average(previous, fast_period)?;
        let slow_prev = average(previous, slow_period)?;

        let direction = if crossed_above(fast_prev, fast_curr, slow_prev, slow_curr) {
            Direction::Long
        } else if crossed_below(fast_prev, fast_curr, slow_prev, slow_curr) {
            Direction::Short
        } else {
            return Ok(None);
        };

        debug!(
            "ma_crossover: {} cross, fast {} slow {}",
            direction, fast_curr, slow_curr
        );
        Ok(Signal::at_last_open(direction, window))
    }
}
