//! RSI Strategy
//!
//! Uses the Relative Strength Index of opening prices to spot oversold and
//! overbought conditions. Goes long when RSI is oversold (< 30) and short when
//! it is overbought (> 70).

use crate::backtest::{Direction, PositionLedger};
use crate::config::RsiConfig;
use crate::data::Candle;
use crate::strategy::base::{Signal, Strategy};
use crate::strategy::indicators::{opens, rolling_rsi};
use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use tracing::debug;

pub struct RsiStrategy {
    config: RsiConfig,
}

impl RsiStrategy {
    pub fn new(config: RsiConfig) -> Self {
        Self { config }
    }

    fn levels(&self) -> Result<(Decimal, Decimal)> {
        let oversold = Decimal::try_from(self.config.oversold)
            .map_err(|e| anyhow!("invalid oversold level {}: {}", self.config.oversold, e))?;
        let overbought = Decimal::try_from(self.config.overbought)
            .map_err(|e| anyhow!("invalid overbought level {}: {}", self.config.overbought, e))?;
        Ok((oversold, overbought))
    }
}

impl Strategy for RsiStrategy {
    fn name(&self) -> &str {
        "rsi"
    }

    fn evaluate(&self, window: &[Candle], _ledger: &PositionLedger) -> Result<Option<Signal>> {
        let (oversold, overbought) = self.levels()?;

        let Some(current_rsi) = rolling_rsi(&opens(window), self.config.period) else {
            return Ok(None);
        };

        let direction = if current_rsi < oversold {
            Direction::Long
        } else if current_rsi > overbought {
            Direction::Short
        } else {
            return Ok(None);
        };

        debug!("rsi: {} at RSI {}", direction, current_rsi.round_dp(2));
        Ok(Signal::at_last_open(direction, window))
    }
}
