//! Technical indicators for trading strategies

use crate::data::Candle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Opening prices of a window, oldest first
pub fn opens(window: &[Candle]) -> Vec<Decimal> {
    window.iter().map(|c| c.open).collect()
}

/// Simple Moving Average over the last `period` prices. `None` if there are
/// fewer prices than `period` or their sum leaves the `Decimal` range.
pub fn sma(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if prices.len() < period || period == 0 {
        return None;
    }

    let sum = prices
        .iter()
        .rev()
        .take(period)
        .try_fold(Decimal::ZERO, |sum, price| sum.checked_add(*price))?;
    Some(sum / Decimal::from(period))
}

/// RSI from plain rolling means of the last `period` gains and losses.
///
/// Needs `period + 1` prices. Returns `None` when there was no movement at
/// all, since the ratio is undefined.
pub fn rolling_rsi(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if prices.len() < period + 1 || period == 0 {
        return None;
    }

    // Each change is scaled before summing so the means stay in range
    let scale = Decimal::from(period);
    let recent = &prices[prices.len() - period - 1..];
    let (avg_gain, avg_loss) = recent.windows(2).try_fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(gain, loss), pair| {
            let change = pair[1].checked_sub(pair[0])? / scale;
            if change > Decimal::ZERO {
                Some((gain.checked_add(change)?, loss))
            } else {
                Some((gain, loss.checked_sub(change)?))
            }
        },
    )?;

    if avg_loss.is_zero() {
        return if avg_gain.is_zero() { None } else { Some(dec!(100)) };
    }

    // A gain/loss ratio beyond the Decimal range reads as RSI 100
    let rsi = avg_gain
        .checked_div(avg_loss)
        .and_then(|rs| rs.checked_add(Decimal::ONE))
        .map(|denominator| dec!(100) - dec!(100) / denominator)
        .unwrap_or(dec!(100));
    Some(rsi)
}

/// Check if fast MA crossed above slow MA (golden cross)
pub fn crossed_above(
    fast_prev: Decimal,
    fast_curr: Decimal,
    slow_prev: Decimal,
    slow_curr: Decimal,
) -> bool {
    fast_prev <= slow_prev && fast_curr > slow_curr
}

/// Check if fast MA crossed below slow MA (death cross)
pub fn crossed_below(
    fast_prev: Decimal,
    fast_curr: Decimal,
    slow_prev: Decimal,
    slow_curr: Decimal,
) -> bool {
    fast_prev >= slow_prev && fast_curr < slow_curr
}
