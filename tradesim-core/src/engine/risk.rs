//! Exit rules evaluated against each open position once per bar.
//!
//! Priority: stop-loss, trailing stop, take-profit, secure-initial, then the
//! strategy's exit signal. The first rule that fires decides the bar for that
//! position.

use crate::config::BacktestConfig;
use crate::domain::{Direction, ExitReason, Position, PriceBar};
use crate::strategy::SignalAction;

use super::costs::CostModel;

/// What to do with one position at this bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitDecision {
    Hold,
    /// Close everything; `trigger` is the price before slippage.
    Full { reason: ExitReason, trigger: f64 },
    /// Sell `quantity` at the close to recover the position's initial capital.
    SecurePartial { quantity: f64, trigger: f64 },
}

/// Rule parameters pulled out of the config once per run.
#[derive(Debug, Clone, Copy)]
pub struct ExitRules {
    pub trailing_distance: Option<f64>,
    pub secure_threshold: Option<f64>,
    pub costs: CostModel,
}

impl ExitRules {
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self {
            trailing_distance: config
                .enable_trailing_stop_loss
                .then_some(config.trailing_stop_loss_distance),
            secure_threshold: config.secure_initial.then_some(config.secure_initial_threshold),
            costs: CostModel::from_config(config),
        }
    }

    /// Decide the exit for `position` at `bar`. Ratchets the trailing stop
    /// in place when it is not breached.
    ///
    /// The position must already be marked to `bar.close`.
    pub fn evaluate(&self, position: &mut Position, bar: &PriceBar, signal: SignalAction) -> ExitDecision {
        let dir = position.direction;

        if stop_breached(dir, position.stop_loss_price, bar) {
            return ExitDecision::Full {
                reason: ExitReason::StopLoss,
                trigger: position.stop_loss_price,
            };
        }

        if let (Some(distance), Some(trail)) = (self.trailing_distance, position.trailing_stop_price) {
            if stop_breached(dir, trail, bar) {
                return ExitDecision::Full {
                    reason: ExitReason::TrailingStop,
                    trigger: trail,
                };
            }
            let candidate = dir.adverse_offset(bar.close, distance);
            position.trailing_stop_price = Some(ratchet(dir, trail, candidate));
        }

        if target_reached(dir, position.take_profit_price, bar) {
            return ExitDecision::Full {
                reason: ExitReason::TakeProfit,
                trigger: position.take_profit_price,
            };
        }

        if let Some(threshold) = self.secure_threshold {
            if !position.secured && position.gain_pct(bar.close) >= threshold {
                if let Some(quantity) = self.secure_quantity(position, bar.close) {
                    return ExitDecision::SecurePartial {
                        quantity,
                        trigger: bar.close,
                    };
                }
            }
        }

        if signal_closes(dir, signal) {
            return ExitDecision::Full {
                reason: ExitReason::Signal,
                trigger: bar.close,
            };
        }

        ExitDecision::Hold
    }

    /// Quantity whose net proceeds at `close` equal the position's initial
    /// capital, or `None` if that would not leave anything open.
    pub fn secure_quantity(&self, position: &Position, close: f64) -> Option<f64> {
        let fill = self.costs.exit_fill(position.direction, close);
        let per_unit = position.release_per_unit(fill, self.costs.fee_rate);
        if per_unit <= 0.0 {
            return None;
        }
        let quantity = position.initial_capital / per_unit;
        (quantity < position.quantity).then_some(quantity)
    }
}

/// Tighten-only update of a trailing stop.
pub fn ratchet(direction: Direction, current: f64, candidate: f64) -> f64 {
    match direction {
        Direction::Long => current.max(candidate),
        Direction::Short => current.min(candidate),
    }
}

fn stop_breached(direction: Direction, stop: f64, bar: &PriceBar) -> bool {
    match direction {
        Direction::Long => bar.low <= stop,
        Direction::Short => bar.high >= stop,
    }
}

fn target_reached(direction: Direction, target: f64, bar: &PriceBar) -> bool {
    match direction {
        Direction::Long => bar.high >= target,
        Direction::Short => bar.low <= target,
    }
}

fn signal_closes(direction: Direction, signal: SignalAction) -> bool {
    matches!(
        (direction, signal),
        (Direction::Long, SignalAction::Sell) | (Direction::Short, SignalAction::Buy)
    )
}
