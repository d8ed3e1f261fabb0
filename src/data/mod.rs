pub mod candles;

pub use candles::{Candle, CandleSeries};
