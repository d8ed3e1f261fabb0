//! Strategy Registry
//!
//! Strategies are compiled in and looked up by name. Callers can register
//! their own implementations next to the built-ins.

use super::base::Strategy;
use super::ma_crossover::MaCrossoverStrategy;
use super::rsi::RsiStrategy;
use crate::config::StrategyConfig;
use std::collections::BTreeMap;

/// Built-in strategy names
pub const STRATEGY_NAMES: &[&str] = &["ma_crossover", "rsi"];

type Factory = Box<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

pub struct StrategyRegistry {
    factories: BTreeMap<String, Factory>,
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in strategies configured from `config`
    pub fn with_builtins(config: &StrategyConfig) -> Self {
        let mut registry = Self::new();

        let ma = config.ma_crossover.clone();
        registry.register("ma_crossover", move || {
            Box::new(MaCrossoverStrategy::new(ma.clone()))
        });

        let rsi = config.rsi.clone();
        registry.register("rsi", move || Box::new(RsiStrategy::new(rsi.clone())));

        registry
    }

    /// Add or replace a strategy factory
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Box::new(factory));
    }

    /// Create a strategy by name
    pub fn create(&self, name: &str) -> Option<Box<dyn Strategy>> {
        let key = canonical_name(name);
        self.factories.get(&key).map(|factory| factory())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&canonical_name(name))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins(&StrategyConfig::default())
    }
}

fn canonical_name(name: &str) -> String {
    match name.trim().to_lowercase().as_str() {
        "ma" | "macross" | "ma_cross" | "trend" | "trend_following" => "ma_crossover".to_string(),
        "rsi_trend" | "rsi_trend_following" => "rsi".to_string(),
        other => other.to_string(),
    }
}

/// Create a built-in strategy by name
pub fn create_strategy(name: &str, config: &StrategyConfig) -> Option<Box<dyn Strategy>> {
    StrategyRegistry::with_builtins(config).create(name)
}

/// Parse a comma-separated list of strategy names
pub fn parse_strategy_list(list: &str) -> Vec<String> {
    if list.trim().to_lowercase() == "all" {
        return STRATEGY_NAMES.iter().map(|s| s.to_string()).collect();
    }

    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::strategy_fn;

    #[test]
    fn test_builtins_registered() {
        let registry = StrategyRegistry::default();
        assert_eq!(registry.names(), STRATEGY_NAMES.to_vec());
        assert_eq!(registry.create("RSI").unwrap().name(), "rsi");
        assert_eq!(registry.create("trend").unwrap().name(), "ma_crossover");
        assert!(registry.create("martingale").is_none());
    }

    #[test]
    fn test_register_custom_strategy() {
        let mut registry = StrategyRegistry::new();
        registry.register("never", || Box::new(strategy_fn("never", |_, _| Ok(None))));
        assert!(registry.contains("Never"));
        assert_eq!(registry.create("never").unwrap().name(), "never");
    }

    #[test]
    fn test_parse_strategy_list() {
        assert_eq!(parse_strategy_list("all"), vec!["ma_crossover", "rsi"]);
        assert_eq!(parse_strategy_list(" RSI, ,ma "), vec!["rsi", "ma"]);
    }
}
