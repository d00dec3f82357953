//! tradesim core: domain types, data providers, strategies, the bar-by-bar
//! simulation engine and its metrics.
//!
//! - Domain types (bars, timeframes, positions, trades)
//! - Backtest configuration with fail-fast validation
//! - Historical data providers behind an async trait, with a caller-owned
//!   [`data::LoadContext`] for rate limiting and circuit breaking
//! - Causal strategy signal functions and the indicators they use
//! - A synchronous, deterministic simulation loop with stop-loss,
//!   trailing-stop, take-profit and secure-initial exits
//! - Equity, drawdown, Sharpe and per-trade statistics

pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod metrics;
pub mod strategy;

pub use config::{BacktestConfig, ConfigError, TradingMode};
pub use data::{DataError, DataRequest, HistoricalDataProvider, LoadContext};
pub use domain::{Direction, ExitReason, Position, PriceBar, Timeframe, Trade};
pub use engine::{run_backtest, BacktestError, BacktestResult};
pub use metrics::TradeStatistics;
pub use strategy::{Signal, SignalAction, Strategy, StrategyError, StrategyParams};
