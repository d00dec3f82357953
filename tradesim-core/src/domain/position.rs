//! Open position state owned by the engine during a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a position within one run. Assigned sequentially from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

/// Side of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Move `price` against a position being opened: longs buy higher, shorts sell lower.
    pub fn adverse_entry(self, price: f64, fraction: f64) -> f64 {
        match self {
            Direction::Long => price * (1.0 + fraction),
            Direction::Short => price * (1.0 - fraction),
        }
    }

    /// Move `price` against a position being closed: longs sell lower, shorts buy higher.
    pub fn adverse_exit(self, price: f64, fraction: f64) -> f64 {
        match self {
            Direction::Long => price * (1.0 - fraction),
            Direction::Short => price * (1.0 + fraction),
        }
    }

    /// Price `pct` percent in the position's favour from `reference`.
    pub fn favorable_offset(self, reference: f64, pct: f64) -> f64 {
        reference * (1.0 + self.sign() * pct / 100.0)
    }

    /// Price `pct` percent against the position from `reference`.
    pub fn adverse_offset(self, reference: f64, pct: f64) -> f64 {
        reference * (1.0 - self.sign() * pct / 100.0)
    }
}

/// A simulated open trade.
///
/// Shorts are collateralised: opening a short commits `entry_price * quantity`
/// of capital, and the position's market value is that collateral plus its
/// unrealized profit. This keeps `equity = capital + sum(market_value)` true
/// for both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub direction: Direction,
    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    /// Fill price including entry slippage.
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub trailing_stop_price: Option<f64>,
    /// Set once the secure-initial partial exit has fired.
    pub secured: bool,
    pub current_price: f64,
    pub unrealized_profit: f64,
    /// Entry fee not yet attributed to a closed trade.
    pub entry_fee: f64,
    /// Capital committed at entry (notional plus fee).
    pub initial_capital: f64,
}

impl Position {
    /// Entry notional of the quantity still open.
    pub fn notional(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// Mark the position to `price`.
    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.unrealized_profit = self.unrealized_pnl(price);
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price) * self.quantity
    }

    /// Unrealized gain at `price` as a percentage of the entry price.
    pub fn gain_pct(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        self.direction.sign() * (price - self.entry_price) / self.entry_price * 100.0
    }

    /// Capital the position would return if valued at `price` before exit costs.
    pub fn market_value(&self, price: f64) -> f64 {
        self.notional() + self.unrealized_pnl(price)
    }

    /// Cash returned per unit when closing at `fill_price` with the given fee rate.
    pub fn release_per_unit(&self, fill_price: f64, fee_rate: f64) -> f64 {
        self.entry_price + self.direction.sign() * (fill_price - self.entry_price)
            - fill_price * fee_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_position(direction: Direction) -> Position {
        Position {
            id: PositionId(1),
            direction,
            entry_bar: 0,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            entry_price: 100.0,
            quantity: 10.0,
            stop_loss_price: 95.0,
            take_profit_price: 110.0,
            trailing_stop_price: None,
            secured: false,
            current_price: 100.0,
            unrealized_profit: 0.0,
            entry_fee: 1.0,
            initial_capital: 1_001.0,
        }
    }

    #[test]
    fn long_market_value_tracks_price() {
        let pos = make_position(Direction::Long);
        assert_eq!(pos.market_value(110.0), 1_100.0);
        assert_eq!(pos.unrealized_pnl(90.0), -100.0);
    }

    #[test]
    fn short_market_value_is_collateral_plus_pnl() {
        let pos = make_position(Direction::Short);
        assert_eq!(pos.market_value(90.0), 1_100.0);
        assert_eq!(pos.market_value(110.0), 900.0);
        assert_eq!(pos.gain_pct(90.0), 10.0);
    }

    #[test]
    fn mark_updates_unrealized_profit() {
        let mut pos = make_position(Direction::Long);
        pos.mark(105.0);
        assert_eq!(pos.current_price, 105.0);
        assert_eq!(pos.unrealized_profit, 50.0);
    }

    #[test]
    fn adverse_fills_worsen_price() {
        assert!(Direction::Long.adverse_entry(100.0, 0.01) > 100.0);
        assert!(Direction::Long.adverse_exit(100.0, 0.01) < 100.0);
        assert!(Direction::Short.adverse_entry(100.0, 0.01) < 100.0);
        assert!(Direction::Short.adverse_exit(100.0, 0.01) > 100.0);
    }

    #[test]
    fn offsets_follow_direction() {
        assert_eq!(Direction::Long.adverse_offset(100.0, 5.0), 95.0);
        assert_eq!(Direction::Short.adverse_offset(100.0, 5.0), 105.0);
        assert!((Direction::Long.favorable_offset(100.0, 10.0) - 110.0).abs() < 1e-9);
        assert!((Direction::Short.favorable_offset(100.0, 10.0) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn release_per_unit_includes_fee() {
        let pos = make_position(Direction::Long);
        // 110 proceeds minus 0.1% fee on 110
        assert!((pos.release_per_unit(110.0, 0.001) - 109.89).abs() < 1e-9);
        let short = make_position(Direction::Short);
        assert!((short.release_per_unit(90.0, 0.0) - 110.0).abs() < 1e-9);
    }
}
