//! Position ledger: every position opened during a run, in creation order

use crate::strategy::Signal;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short
    pub fn sign(self) -> i32 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    fn sign_decimal(self) -> Decimal {
        Decimal::from(self.sign())
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: usize,
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
}

impl Position {
    fn open(id: usize, signal: &Signal) -> Self {
        Self {
            id,
            direction: signal.direction,
            entry_time: signal.time,
            entry_price: signal.price,
            exit_time: None,
            exit_price: None,
            realized_pnl: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    /// P&L of closing at `price`, signed by direction. `None` if the result
    /// falls outside the `Decimal` range.
    pub fn calculate_pnl(&self, price: Decimal) -> Option<Decimal> {
        price
            .checked_sub(self.entry_price)?
            .checked_mul(self.direction.sign_decimal())
    }

    /// Realized P&L over entry price, as a fraction. `None` while open or
    /// when the entry price is zero.
    pub fn return_pct(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;

        if self.entry_price.is_zero() {
            return None;
        }
        let pnl = self.realized_pnl?.to_f64()?;
        let entry = self.entry_price.to_f64()?;
        Some(pnl / entry)
    }

    pub fn holding_period(&self) -> Option<Duration> {
        self.exit_time.map(|exit| exit - self.entry_time)
    }

    fn close(&mut self, time: DateTime<Utc>, price: Decimal) -> Result<()> {
        debug_assert!(self.is_open(), "position {} closed twice", self.id);
        let pnl = self.calculate_pnl(price).ok_or_else(|| {
            anyhow!(
                "P&L of closing position {} at {} is out of range",
                self.id,
                price
            )
        })?;
        self.realized_pnl = Some(pnl);
        self.exit_time = Some(time);
        self.exit_price = Some(price);
        Ok(())
    }
}

/// Ordered record of all positions for one backtest run. Positions are never
/// removed, and a closed position is never touched again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionLedger {
    positions: Vec<Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open())
    }

    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_closed())
    }

    /// Append a new open position built verbatim from `signal`
    pub(crate) fn open(&mut self, signal: &Signal) -> &Position {
        let id = self.positions.len() + 1;
        self.positions.push(Position::open(id, signal));
        &self.positions[id - 1]
    }

    /// Close the most recently opened position still open in `direction`.
    /// Returns the closed position, or `None` if there was nothing to close.
    /// The position stays open if its P&L cannot be represented.
    pub(crate) fn close_latest(
        &mut self,
        direction: Direction,
        time: DateTime<Utc>,
        price: Decimal,
    ) -> Result<Option<&Position>> {
        let Some(position) = self
            .positions
            .iter_mut()
            .rev()
            .find(|p| p.is_open() && p.direction == direction)
        else {
            return Ok(None);
        };
        position.close(time, price)?;
        Ok(Some(&*position))
    }
}
