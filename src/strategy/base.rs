use crate::backtest::{Direction, PositionLedger};
use crate::data::Candle;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Instruction to open (or, via the closing policy, close) a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub time: DateTime<Utc>,
    pub price: Decimal,
}

impl Signal {
    pub fn long(time: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            direction: Direction::Long,
            time,
            price,
        }
    }

    /// Signal at the open of the newest bar in `window`
    pub fn at_last_open(direction: Direction, window: &[Candle]) -> Option<Self> {
        let last = window.last()?;
        Some(Self {
            direction,
            time: last.timestamp,
            price: last.open,
        })
    }
}

/// A trading strategy evaluated once per bar.
///
/// `window` holds every candle up to and including the current bar and never
/// anything later. Implementations must not rely on hidden mutable state: the
/// engine may replay the same strategy over different series concurrently.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, window: &[Candle], ledger: &PositionLedger) -> Result<Option<Signal>>;
}

/// Adapter turning a closure into a [`Strategy`]
pub struct FnStrategy<F> {
    name: String,
    func: F,
}

impl<F> Strategy for FnStrategy<F>
where
    F: Fn(&[Candle], &PositionLedger) -> Result<Option<Signal>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, window: &[Candle], ledger: &PositionLedger) -> Result<Option<Signal>> {
        (self.func)(window, ledger)
    }
}

pub fn strategy_fn<F>(name: &str, func: F) -> FnStrategy<F>
where
    F: Fn(&[Candle], &PositionLedger) -> Result<Option<Signal>> + Send + Sync,
{
    FnStrategy {
        name: name.to_string(),
        func,
    }
}
