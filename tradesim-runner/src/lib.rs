//! tradesim runner: run files, data loading, backtest orchestration, sweeps.
//!
//! This crate builds on `tradesim-core` to provide:
//! - TOML run files with strict key checking and parameter grids
//! - Asynchronous, cancellable historical data loading with dataset hashing
//! - The load → simulate pipeline with content-addressed run ids
//! - Parallel parameter sweeps with deterministic ranking
//! - Plain-text summaries and tables

pub mod config;
pub mod data_loader;
pub mod report;
pub mod runner;
pub mod sweep;

pub use config::{DataSpec, ProviderKind, RankMetric, RunSpec, RunSpecError, SweepSpec};
pub use data_loader::{
    compute_dataset_hash, load_historical_data, load_historical_data_cancellable, LoadError,
    LoadedData,
};
pub use report::{RunSummary, SweepTable, TradeTable};
pub use runner::{compute_run_id, execute, run_spec, run_spec_cancellable, RunError, RunReport};
pub use sweep::{run_sweep, sweep_spec, SweepEntry, SweepReport};
