pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod strategy;

pub use backtest::{run_backtest, run_backtest_with};
pub use config::Config;
pub use error::BacktestError;
