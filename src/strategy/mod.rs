pub mod base;
pub mod indicators;
pub mod ma_crossover;
pub mod registry;
pub mod rsi;

pub use base::{strategy_fn, FnStrategy, Signal, Strategy};
pub use ma_crossover::MaCrossoverStrategy;
pub use registry::{create_strategy, parse_strategy_list, StrategyRegistry, STRATEGY_NAMES};
pub use rsi::RsiStrategy;
