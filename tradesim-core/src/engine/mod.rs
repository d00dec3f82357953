//! Backtest simulation engine.
//!
//! A single synchronous forward pass over a fully loaded bar series. All run
//! state lives in a [`RunContext`] local to one call of [`run_backtest`], so
//! any number of runs may execute in parallel.

pub mod costs;
pub mod loop_runner;
pub mod result;
pub mod risk;
pub mod sizing;
pub mod state;

pub use costs::CostModel;
pub use loop_runner::{run_backtest, BacktestError};
pub use result::BacktestResult;
pub use risk::{ratchet, ExitDecision, ExitRules};
pub use sizing::{entry_notional, MIN_NOTIONAL};
pub use state::RunContext;
