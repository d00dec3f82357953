//! Buy once and never sell; exits come only from risk rules.

use super::{causal_prefix, Signal, Strategy, StrategyError};
use crate::domain::PriceBar;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuyAndHold;

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    /// `buy` at index 1, the first bar with any history; `hold` otherwise.
    fn evaluate(&self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        causal_prefix(bars, index)?;
        Ok(if index == 1 {
            Signal::buy(1.0)
        } else {
            Signal::hold()
        })
    }
}
