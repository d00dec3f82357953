//! Closed parameter sets for the built-in strategies.
//!
//! `StrategyParams` is tagged by `kind`; each variant's struct rejects keys
//! it does not know, so a typo in a run file fails at parse time instead of
//! silently falling back to a default.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    BollingerReversion, Breakout, BuyAndHold, MaCrossover, MaType, RsiReversion, Strategy,
    StrategyError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaCrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    #[serde(default)]
    pub ma_type: MaType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RsiReversionParams {
    #[serde(default = "default_rsi_period")]
    pub period: usize,
    #[serde(default = "default_oversold")]
    pub oversold: f64,
    #[serde(default = "default_overbought")]
    pub overbought: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakoutParams {
    pub lookback: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BollingerReversionParams {
    #[serde(default = "default_bollinger_period")]
    pub period: usize,
    #[serde(default = "default_num_std")]
    pub num_std: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuyAndHoldParams {}

fn default_rsi_period() -> usize {
    14
}

fn default_oversold() -> f64 {
    30.0
}

fn default_overbought() -> f64 {
    70.0
}

fn default_bollinger_period() -> usize {
    20
}

fn default_num_std() -> f64 {
    2.0
}

/// Strategy selection plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyParams {
    MaCrossover(MaCrossoverParams),
    RsiReversion(RsiReversionParams),
    Breakout(BreakoutParams),
    BollingerReversion(BollingerReversionParams),
    BuyAndHold(BuyAndHoldParams),
}

impl StrategyParams {
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyParams::MaCrossover(_) => "ma_crossover",
            StrategyParams::RsiReversion(_) => "rsi_reversion",
            StrategyParams::Breakout(_) => "breakout",
            StrategyParams::BollingerReversion(_) => "bollinger_reversion",
            StrategyParams::BuyAndHold(_) => "buy_and_hold",
        }
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        let invalid = |msg: String| Err(StrategyError::InvalidParams(msg));
        match self {
            StrategyParams::MaCrossover(p) => {
                if p.fast_period < 1 {
                    return invalid("fast_period must be >= 1".into());
                }
                if p.slow_period <= p.fast_period {
                    return invalid(format!(
                        "slow_period ({}) must be greater than fast_period ({})",
                        p.slow_period, p.fast_period
                    ));
                }
            }
            StrategyParams::RsiReversion(p) => {
                if p.period < 1 {
                    return invalid("period must be >= 1".into());
                }
                let in_range = |v: f64| v.is_finite() && v > 0.0 && v < 100.0;
                if !in_range(p.oversold) || !in_range(p.overbought) {
                    return invalid("oversold and overbought must be within (0, 100)".into());
                }
                if p.oversold >= p.overbought {
                    return invalid(format!(
                        "oversold ({}) must be below overbought ({})",
                        p.oversold, p.overbought
                    ));
                }
            }
            StrategyParams::Breakout(p) => {
                if p.lookback < 1 {
                    return invalid("lookback must be >= 1".into());
                }
            }
            StrategyParams::BollingerReversion(p) => {
                if p.period < 2 {
                    return invalid("period must be >= 2".into());
                }
                if !(p.num_std.is_finite() && p.num_std > 0.0) {
                    return invalid(format!("num_std must be positive, got {}", p.num_std));
                }
            }
            StrategyParams::BuyAndHold(_) => {}
        }
        Ok(())
    }

    /// Validate, then construct the strategy.
    pub fn build(&self) -> Result<Box<dyn Strategy>, StrategyError> {
        self.validate()?;
        let strategy: Box<dyn Strategy> = match self {
            StrategyParams::MaCrossover(p) => {
                Box::new(MaCrossover::new(p.fast_period, p.slow_period, p.ma_type))
            }
            StrategyParams::RsiReversion(p) => {
                Box::new(RsiReversion::new(p.period, p.oversold, p.overbought))
            }
            StrategyParams::Breakout(p) => Box::new(Breakout::new(p.lookback)),
            StrategyParams::BollingerReversion(p) => {
                Box::new(BollingerReversion::new(p.period, p.num_std))
            }
            StrategyParams::BuyAndHold(_) => Box::new(BuyAndHold),
        };
        Ok(strategy)
    }
}

/// Compact label, e.g. `ma_crossover(fast=10, slow=50, ema)`.
impl fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyParams::MaCrossover(p) => write!(
                f,
                "ma_crossover(fast={}, slow={}, {})",
                p.fast_period,
                p.slow_period,
                p.ma_type.as_str()
            ),
            StrategyParams::RsiReversion(p) => write!(
                f,
                "rsi_reversion(period={}, oversold={}, overbought={})",
                p.period, p.oversold, p.overbought
            ),
            StrategyParams::Breakout(p) => write!(f, "breakout(lookback={})", p.lookback),
            StrategyParams::BollingerReversion(p) => write!(
                f,
                "bollinger_reversion(period={}, num_std={})",
                p.period, p.num_std
            ),
            StrategyParams::BuyAndHold(_) => f.write_str("buy_and_hold"),
        }
    }
}
