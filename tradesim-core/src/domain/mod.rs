//! Domain types for tradesim.

pub mod bar;
pub mod position;
pub mod timeframe;
pub mod trade;

pub use bar::PriceBar;
pub use position::{Direction, Position, PositionId};
pub use timeframe::Timeframe;
pub use trade::{ExitReason, Trade, TradeStatus};
