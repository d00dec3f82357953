//! Strategy signal functions.
//!
//! Strategies are portfolio-agnostic: they see the bar history and nothing
//! else. The engine hands each call the causal prefix `bars[..=index]`, so a
//! strategy cannot read a bar that has not closed yet.
//!
//! A run drives the strategy through a [`StrategySession`]. Strategies built
//! on recursive indicators override [`Strategy::session`] to carry indicator
//! state from one bar to the next instead of recomputing the whole prefix.

pub mod bollinger_reversion;
pub mod breakout;
pub mod buy_and_hold;
pub mod ma_crossover;
pub mod params;
pub mod rsi_reversion;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PriceBar;

pub use bollinger_reversion::BollingerReversion;
pub use breakout::Breakout;
pub use buy_and_hold::BuyAndHold;
pub use ma_crossover::{MaCrossover, MaType};
pub use params::{
    BollingerReversionParams, BreakoutParams, BuyAndHoldParams, MaCrossoverParams,
    RsiReversionParams, StrategyParams,
};
pub use rsi_reversion::RsiReversion;

/// What the strategy wants done at this bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
            SignalAction::Hold => "hold",
        })
    }
}

/// Output of one strategy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: SignalAction,
    /// Conviction in `[0, 1]`.
    pub confidence: f64,
    /// Indicator readings behind the decision (e.g. `rsi`, `fast_ma`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, f64>,
}

impl Signal {
    pub fn new(action: SignalAction, confidence: f64) -> Self {
        Self {
            action,
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            metadata: BTreeMap::new(),
        }
    }

    pub fn buy(confidence: f64) -> Self {
        Self::new(SignalAction::Buy, confidence)
    }

    pub fn sell(confidence: f64) -> Self {
        Self::new(SignalAction::Sell, confidence)
    }

    pub fn hold() -> Self {
        Self::new(SignalAction::Hold, 0.0)
    }

    pub fn with_meta(mut self, key: &str, value: f64) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn is_buy(&self) -> bool {
        self.action == SignalAction::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.action == SignalAction::Sell
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("invalid strategy parameters: {0}")]
    InvalidParams(String),

    #[error("bar index {index} out of range for {len} bars")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("strategy evaluation failed: {0}")]
    Evaluation(String),
}

/// A causal signal function.
///
/// # Contract
/// - Reads only `bars[..=index]`; `index < bars.len()`.
/// - Pure with respect to the bars: same prefix, same signal.
/// - Returns [`Signal::hold`] while there is too little history.
pub trait Strategy: Send + Sync {
    /// Human-readable name (e.g., "ma_crossover").
    fn name(&self) -> &str;

    fn evaluate(&self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError>;

    /// Evaluation state for one run over one series.
    ///
    /// The default session calls [`Strategy::evaluate`] at every bar.
    fn session(&self) -> Box<dyn StrategySession + '_> {
        Box::new(Stateless(self))
    }
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(&self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        (**self).evaluate(bars, index)
    }

    fn session(&self) -> Box<dyn StrategySession + '_> {
        (**self).session()
    }
}

/// A strategy evaluated bar after bar over a single series.
///
/// # Contract
/// - Every call returns the signal [`Strategy::evaluate`] gives for the same
///   `bars` and `index`.
/// - Calls with `index` one past the previous call are the cheap path. Any
///   other index makes the session rebuild its state from `bars[..index]`.
/// - All calls of one session see the same series.
pub trait StrategySession: Send {
    fn evaluate(&mut self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError>;
}

struct Stateless<'a, S: ?Sized>(&'a S);

impl<S: Strategy + ?Sized> StrategySession for Stateless<'_, S> {
    fn evaluate(&mut self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        self.0.evaluate(bars, index)
    }
}

/// Adapts a closure into a [`Strategy`].
pub struct FnStrategy<F> {
    name: String,
    f: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&[PriceBar], usize) -> Result<Signal, StrategyError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Strategy for FnStrategy<F>
where
    F: Fn(&[PriceBar], usize) -> Result<Signal, StrategyError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        (self.f)(bars, index)
    }
}

impl<F> fmt::Debug for FnStrategy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStrategy").field("name", &self.name).finish()
    }
}

/// Bars up to and including `index`, or an error if `index` is out of range.
pub(crate) fn causal_prefix(bars: &[PriceBar], index: usize) -> Result<&[PriceBar], StrategyError> {
    if index >= bars.len() {
        return Err(StrategyError::IndexOutOfRange {
            index,
            len: bars.len(),
        });
    }
    Ok(&bars[..=index])
}
