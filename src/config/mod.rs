use anyhow::{Context, Result};
use config::{Config as ConfigLoader, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestSettings {
    /// Candle CSV used when no file is given on the command line
    #[serde(default)]
    pub data_file: Option<String>,
    /// Annual risk-free rate used by Sharpe and Sortino
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default = "default_trading_days")]
    pub trading_days: u32,
}

fn default_risk_free_rate() -> f64 {
    0.01
}

fn default_trading_days() -> u32 {
    252
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            data_file: None,
            risk_free_rate: default_risk_free_rate(),
            trading_days: default_trading_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub ma_crossover: MaCrossoverConfig,
    #[serde(default)]
    pub rsi: RsiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaCrossoverConfig {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl Default for MaCrossoverConfig {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl Config {
    /// Load `config/default.toml` (if present) overlaid with `BACKTEST__*`
    /// environment variables, e.g. `BACKTEST__BACKTEST__RISK_FREE_RATE=0.02`.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let settings = ConfigLoader::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(config::Environment::with_prefix("BACKTEST").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    fn config_path() -> PathBuf {
        let local_config = PathBuf::from("config/default.toml");
        if local_config.exists() {
            return local_config;
        }

        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let exe_config = exe_dir.join("config/default.toml");
                if exe_config.exists() {
                    return exe_config;
                }
            }
        }

        local_config
    }
}
