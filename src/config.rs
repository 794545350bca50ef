//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files. Strategy
//! parameters are validated up front so a bad file fails at startup rather
//! than mid-replay.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::Symbol;

/// Validation errors for strategy parameters
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("risk_reward_ratio must be > 0, got {0}")]
    NonPositiveRiskReward(f64),

    #[error("{name} must be in (0, 1), got {value}")]
    FractionOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be a positive number of bars, got {value}")]
    NonPositivePeriod { name: &'static str, value: usize },

    #[error("volatility_spike_multiplier must be > 1, got {0}")]
    SpikeMultiplierTooSmall(f64),

    #[error("{name} is required for the range_filtered variant")]
    MissingRangeFilteredField { name: &'static str },

    #[error("starting_cash must be positive, got {0}")]
    NonPositiveCash(f64),

    #[error("end_date {end} must be after start_date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    pub strategy: StrategyConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Validate account and strategy parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.account.validate()?;
        self.strategy.validate()
    }

    /// Preset matching the original mean-reversion deployment: EURUSD at
    /// minute resolution with hedged sizing and a wide drawdown stop
    pub fn basic_preset() -> Self {
        Config {
            account: AccountConfig {
                symbol: "EURUSD".to_string(),
                resolution: Resolution::Minute,
                starting_cash: 1_000_000.0,
                start_date: NaiveDate::from_ymd_opt(2019, 10, 20).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2019, 11, 25).unwrap(),
            },
            strategy: StrategyConfig {
                variant: StrategyVariant::Basic,
                risk_reward_ratio: 2.0,
                max_drawdown_fraction: 0.02,
                base_position_fraction: 0.01,
                range_lookback: 20,
                atr_period: 14,
                margin_fraction: 0.25,
                volatility_spike_multiplier: 1.5,
                range_update_interval_minutes: None,
                max_open_orders: None,
                bollinger_std_dev: default_bollinger_std_dev(),
            },
        }
    }

    /// Preset for the Bollinger-filtered deployment with periodic range
    /// refresh and an order-count cap
    pub fn range_filtered_preset() -> Self {
        Config {
            account: AccountConfig {
                symbol: "EURUSD".to_string(),
                resolution: Resolution::Minute,
                starting_cash: 100_000.0,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            },
            strategy: StrategyConfig {
                variant: StrategyVariant::RangeFiltered,
                risk_reward_ratio: 2.0,
                max_drawdown_fraction: 0.02,
                base_position_fraction: 0.02,
                range_lookback: 20,
                atr_period: 14,
                margin_fraction: 0.40,
                volatility_spike_multiplier: 1.2,
                range_update_interval_minutes: Some(240),
                max_open_orders: Some(6),
                bollinger_std_dev: default_bollinger_std_dev(),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::basic_preset()
    }
}

/// Bar resolution of the incoming data feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Minute,
    Hour,
    Daily,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Minute => write!(f, "minute"),
            Resolution::Hour => write!(f, "hour"),
            Resolution::Daily => write!(f, "daily"),
        }
    }
}

/// Account setup: instrument, data resolution, cash and replay window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub symbol: String,
    pub resolution: Resolution,
    pub starting_cash: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl AccountConfig {
    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.symbol)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.starting_cash <= 0.0 {
            return Err(ConfigError::NonPositiveCash(self.starting_cash));
        }
        if self.end_date <= self.start_date {
            return Err(ConfigError::EndBeforeStart {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }
}

/// Strategy variant selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyVariant {
    /// Set-once range levels, no market-condition filter
    Basic,
    /// Periodic range refresh gated by a Bollinger range-bound filter
    RangeFiltered,
}

impl fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyVariant::Basic => write!(f, "basic"),
            StrategyVariant::RangeFiltered => write!(f, "range_filtered"),
        }
    }
}

fn default_bollinger_std_dev() -> f64 {
    2.0
}

/// Strategy parameters, immutable once loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub variant: StrategyVariant,
    /// Take-profit distance as a multiple of the stop distance
    pub risk_reward_ratio: f64,
    /// Unrealized loss fraction that forces liquidation
    pub max_drawdown_fraction: f64,
    /// Cap on a single entry as a fraction of portfolio value
    pub base_position_fraction: f64,
    /// Bars in the rolling high/low window
    pub range_lookback: usize,
    pub atr_period: usize,
    /// Minimum free-margin fraction required to open a trade
    pub margin_fraction: f64,
    pub volatility_spike_multiplier: f64,
    /// Minutes between range recomputations (range_filtered only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_update_interval_minutes: Option<u64>,
    /// Cap on simultaneously open orders (range_filtered only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_open_orders: Option<usize>,
    /// Bollinger band width in standard deviations
    #[serde(default = "default_bollinger_std_dev")]
    pub bollinger_std_dev: f64,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.risk_reward_ratio <= 0.0 {
            return Err(ConfigError::NonPositiveRiskReward(
                self.risk_reward_ratio,
            ));
        }

        for (name, value) in [
            ("max_drawdown_fraction", self.max_drawdown_fraction),
            ("base_position_fraction", self.base_position_fraction),
            ("margin_fraction", self.margin_fraction),
        ] {
            if value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::FractionOutOfRange { name, value });
            }
        }

        for (name, value) in [
            ("range_lookback", self.range_lookback),
            ("atr_period", self.atr_period),
        ] {
            if value == 0 {
                return Err(ConfigError::NonPositivePeriod { name, value });
            }
        }

        if self.volatility_spike_multiplier <= 1.0 {
            return Err(ConfigError::SpikeMultiplierTooSmall(
                self.volatility_spike_multiplier,
            ));
        }

        if self.variant == StrategyVariant::RangeFiltered {
            if self.range_update_interval_minutes.is_none() {
                return Err(ConfigError::MissingRangeFilteredField {
                    name: "range_update_interval_minutes",
                });
            }
            match self.max_open_orders {
                None => {
                    return Err(ConfigError::MissingRangeFilteredField {
                        name: "max_open_orders",
                    });
                }
                Some(0) => {
                    return Err(ConfigError::NonPositivePeriod {
                        name: "max_open_orders",
                        value: 0,
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Config::basic_preset().strategy
    }
}
