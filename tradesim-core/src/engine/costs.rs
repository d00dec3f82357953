//! Fees and slippage.

use crate::config::BacktestConfig;
use crate::domain::Direction;

/// Per-side fee and adverse slippage, both as fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub fee_rate: f64,
    pub slippage_rate: f64,
}

impl CostModel {
    pub fn new(fee_rate: f64, slippage_rate: f64) -> Self {
        Self {
            fee_rate,
            slippage_rate,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(config.fee_rate(), config.slippage_rate())
    }

    /// Fill price for opening `direction` at `reference`.
    pub fn entry_fill(&self, direction: Direction, reference: f64) -> f64 {
        direction.adverse_entry(reference, self.slippage_rate)
    }

    /// Fill price for closing `direction` with a trigger at `reference`.
    pub fn exit_fill(&self, direction: Direction, reference: f64) -> f64 {
        direction.adverse_exit(reference, self.slippage_rate)
    }

    /// Fee on `quantity` units filled at `fill_price`.
    pub fn fee(&self, fill_price: f64, quantity: f64) -> f64 {
        fill_price * quantity * self.fee_rate
    }

    /// Stop-loss trigger for a position opened at `entry_fill`.
    ///
    /// Starts `stop_pct` percent from the fill and tightens so that a fill at
    /// the trigger, after exit slippage, the entry fee and the exit fee, loses
    /// at most `stop_pct` plus one fee and one slippage of the entry notional.
    /// Never looser than the plain `stop_pct` offset.
    pub fn stop_price(&self, direction: Direction, entry_fill: f64, stop_pct: f64) -> f64 {
        let nominal = direction.adverse_offset(entry_fill, stop_pct);
        let stop = stop_pct / 100.0;
        let (fee, slip) = (self.fee_rate, self.slippage_rate);
        match direction {
            Direction::Long => {
                let denom = (1.0 - fee) * (1.0 - slip);
                if denom <= 0.0 {
                    return nominal;
                }
                nominal.max(entry_fill * (1.0 - stop - slip) / denom)
            }
            Direction::Short => {
                nominal.min(entry_fill * (1.0 + stop + slip) / ((1.0 + fee) * (1.0 + slip)))
            }
        }
    }
}
