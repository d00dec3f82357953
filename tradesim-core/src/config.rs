//! Backtest configuration and fail-fast validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Timeframe;

/// Invalid configuration values. Raised before the simulation loop starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial_capital must be a positive finite number, got {0}")]
    InitialCapital(f64),

    #[error("{field} must be within (0, 100], got {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be a non-negative finite number, got {value}")]
    NegativeCost { field: &'static str, value: f64 },

    #[error("max_positions must be at least 1, got {0}")]
    MaxPositions(usize),

    #[error("trailing_stop_loss_distance must be within (0, 100) when trailing stops are enabled, got {0}")]
    TrailingDistance(f64),

    #[error("secure_initial_threshold must be positive when secure_initial is enabled, got {0}")]
    SecureThreshold(f64),

    #[error("start_date {start} is after end_date {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid strategy parameter: {0}")]
    StrategyParams(String),
}

/// Which signal directions may open positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    /// `buy` opens longs; `sell` only closes them.
    #[default]
    LongOnly,
    /// `buy` opens longs and `sell` opens shorts.
    LongShort,
}

/// Risk and cost configuration for a single backtest run.
///
/// All percent fields are whole-number percentages: `10.0` means 10%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    pub strategy_name: String,
    pub initial_capital: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub trading_mode: TradingMode,

    #[serde(default)]
    pub fee_percentage: f64,
    #[serde(default)]
    pub slippage_percentage: f64,

    #[serde(default)]
    pub enable_trailing_stop_loss: bool,
    #[serde(default = "default_trailing_distance")]
    pub trailing_stop_loss_distance: f64,

    #[serde(default)]
    pub secure_initial: bool,
    #[serde(default = "default_secure_threshold")]
    pub secure_initial_threshold: f64,

    pub take_profit: f64,
    pub stop_loss: f64,

    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    /// Upper bound on a new position's notional, as a percent of equity.
    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,
    /// Equity percent lost if a new position hits its stop-loss.
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: f64,
}

fn default_trailing_distance() -> f64 {
    5.0
}

fn default_secure_threshold() -> f64 {
    100.0
}

fn default_max_positions() -> usize {
    1
}

fn default_max_position_size() -> f64 {
    100.0
}

fn default_risk_per_trade() -> f64 {
    100.0
}

impl BacktestConfig {
    /// Config with frictionless costs, 10% take-profit and 5% stop-loss.
    ///
    /// The default risk budget never binds, so each entry is sized by
    /// `max_position_size` alone.
    pub fn new(strategy_name: impl Into<String>, initial_capital: f64) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            initial_capital,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            timeframe: Timeframe::D1,
            trading_mode: TradingMode::LongOnly,
            fee_percentage: 0.0,
            slippage_percentage: 0.0,
            enable_trailing_stop_loss: false,
            trailing_stop_loss_distance: default_trailing_distance(),
            secure_initial: false,
            secure_initial_threshold: default_secure_threshold(),
            take_profit: 10.0,
            stop_loss: 5.0,
            max_positions: default_max_positions(),
            max_position_size: default_max_position_size(),
            risk_per_trade: default_risk_per_trade(),
        }
    }

    /// Check every field. The first violation wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::InitialCapital(self.initial_capital));
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::DateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        check_percent("stop_loss", self.stop_loss)?;
        check_percent("take_profit", self.take_profit)?;
        check_percent("max_position_size", self.max_position_size)?;
        check_percent("risk_per_trade", self.risk_per_trade)?;
        check_cost("fee_percentage", self.fee_percentage)?;
        check_cost("slippage_percentage", self.slippage_percentage)?;
        if self.max_positions < 1 {
            return Err(ConfigError::MaxPositions(self.max_positions));
        }
        if self.enable_trailing_stop_loss {
            let d = self.trailing_stop_loss_distance;
            if !(d.is_finite() && d > 0.0 && d < 100.0) {
                return Err(ConfigError::TrailingDistance(d));
            }
        }
        if self.secure_initial {
            let t = self.secure_initial_threshold;
            if !(t.is_finite() && t > 0.0) {
                return Err(ConfigError::SecureThreshold(t));
            }
        }
        Ok(())
    }

    /// Fee per side as a fraction of notional.
    pub fn fee_rate(&self) -> f64 {
        self.fee_percentage / 100.0
    }

    /// Slippage as a fraction of the reference price.
    pub fn slippage_rate(&self) -> f64 {
        self.slippage_percentage / 100.0
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self::new("unnamed", 10_000.0)
    }
}

fn check_percent(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(ConfigError::PercentOutOfRange { field, value })
    }
}

fn check_cost(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeCost { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(BacktestConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_capital() {
        let mut config = BacktestConfig::default();
        config.initial_capital = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InitialCapital(0.0)));
        config.initial_capital = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InitialCapital(_))));
    }

    #[test]
    fn rejects_stop_loss_outside_range() {
        let mut config = BacktestConfig::default();
        config.stop_loss = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PercentOutOfRange { field: "stop_loss", .. })
        ));
        config.stop_loss = 100.5;
        assert!(config.validate().is_err());
        config.stop_loss = 100.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_take_profit_outside_range() {
        let mut config = BacktestConfig::default();
        config.take_profit = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PercentOutOfRange { field: "take_profit", .. })
        ));
    }

    #[test]
    fn rejects_zero_max_positions() {
        let mut config = BacktestConfig::default();
        config.max_positions = 0;
        assert_eq!(config.validate(), Err(ConfigError::MaxPositions(0)));
    }

    #[test]
    fn rejects_negative_costs() {
        let mut config = BacktestConfig::default();
        config.slippage_percentage = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeCost { field: "slippage_percentage", .. })
        ));
    }

    #[test]
    fn trailing_distance_checked_only_when_enabled() {
        let mut config = BacktestConfig::default();
        config.trailing_stop_loss_distance = 0.0;
        assert!(config.validate().is_ok());
        config.enable_trailing_stop_loss = true;
        assert_eq!(config.validate(), Err(ConfigError::TrailingDistance(0.0)));
    }

    #[test]
    fn secure_threshold_checked_only_when_enabled() {
        let mut config = BacktestConfig::default();
        config.secure_initial_threshold = -5.0;
        assert!(config.validate().is_ok());
        config.secure_initial = true;
        assert_eq!(config.validate(), Err(ConfigError::SecureThreshold(-5.0)));
    }

    #[test]
    fn rejects_inverted_dates() {
        let mut config = BacktestConfig::default();
        config.start_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::DateRange { .. })));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let json = r#"{
            "strategy_name": "x", "initial_capital": 1000.0,
            "start_date": "2024-01-01", "end_date": "2024-02-01",
            "take_profit": 10.0, "stop_loss": 5.0, "leverage": 3
        }"#;
        assert!(serde_json::from_str::<BacktestConfig>(json).is_err());
    }

    #[test]
    fn omitted_optional_fields_take_defaults() {
        let json = r#"{
            "strategy_name": "x", "initial_capital": 1000.0,
            "start_date": "2024-01-01", "end_date": "2024-02-01",
            "take_profit": 10.0, "stop_loss": 5.0
        }"#;
        let config: BacktestConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_positions, 1);
        assert_eq!(config.timeframe, Timeframe::D1);
        assert_eq!(config.trading_mode, TradingMode::LongOnly);
        assert!(config.validate().is_ok());
    }
}
