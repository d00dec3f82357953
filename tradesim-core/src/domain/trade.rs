//! Trade: a closed round trip (or the secured slice of one).

use super::position::{Direction, PositionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a trade record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// Why a position (or part of one) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    TakeProfit,
    SecureInitial,
    Signal,
    EndOfBacktest,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::SecureInitial => "secure_initial",
            ExitReason::Signal => "signal",
            ExitReason::EndOfBacktest => "end_of_backtest",
        }
    }

    /// True for exits that leave part of the position open.
    pub fn is_partial(&self) -> bool {
        matches!(self, ExitReason::SecureInitial)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed trade record. Never modified after the engine appends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub position_id: PositionId,
    pub direction: Direction,

    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    pub exit_bar: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,

    pub quantity: f64,

    /// Realized profit after entry and exit fees and slippage.
    pub profit: f64,
    /// `profit` relative to entry notional, in percent.
    pub profit_percentage: f64,
    /// Entry fee share plus exit fee.
    pub fees: f64,

    pub bars_held: usize,
    pub status: TradeStatus,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.profit > 0.0
    }

    /// True for the record that ends a position; false for a secured slice.
    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }

    pub fn entry_notional(&self) -> f64 {
        self.entry_price * self.quantity
    }
}
