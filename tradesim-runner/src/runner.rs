//! Backtest runner: wires data loading, strategy construction and the engine.
//!
//! Two entry points:
//! - `run_spec()`: loads data for a run file, then runs. Used by the CLI.
//! - `execute()`: takes pre-loaded data. Used by sweeps and tests.
//!
//! The engine is CPU-bound and synchronous, so async callers run it on the
//! blocking pool.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use tradesim_core::data::{DataSource, HistoricalDataProvider, LoadContext};
use tradesim_core::{
    run_backtest, BacktestConfig, BacktestError, BacktestResult, StrategyError, StrategyParams,
};

use crate::config::{RunSpec, RunSpecError};
use crate::data_loader::{
    load_historical_data, load_historical_data_cancellable, LoadError, LoadedData,
};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Spec(#[from] RunSpecError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Backtest(#[from] BacktestError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("failed to fingerprint run: {0}")]
    Fingerprint(#[from] serde_json::Error),

    #[error("backtest task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// One completed run with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// BLAKE3 over the config, strategy parameters and dataset hash.
    pub run_id: String,
    pub symbol: String,
    pub provider: String,
    pub source: DataSource,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub config: BacktestConfig,
    pub strategy: StrategyParams,
    pub result: BacktestResult,
}

/// Content-addressed run identifier.
///
/// Identical config, strategy and data always give the same id.
pub fn compute_run_id(
    config: &BacktestConfig,
    strategy: &StrategyParams,
    dataset_hash: &str,
) -> Result<String, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(&mut hasher, config)?;
    serde_json::to_writer(&mut hasher, strategy)?;
    hasher.update(dataset_hash.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

/// Run a backtest over pre-loaded data. No I/O.
pub fn execute(
    config: &BacktestConfig,
    strategy: &StrategyParams,
    loaded: &LoadedData,
    symbol: &str,
) -> Result<RunReport, RunError> {
    let built = strategy.build()?;
    let result = run_backtest(config, &loaded.bars, &built)?;
    let run_id = compute_run_id(config, strategy, &loaded.dataset_hash)?;

    Ok(RunReport {
        run_id,
        symbol: symbol.to_string(),
        provider: loaded.provider.clone(),
        source: loaded.source,
        dataset_hash: loaded.dataset_hash.clone(),
        bar_count: loaded.bars.len(),
        config: config.clone(),
        strategy: strategy.clone(),
        result,
    })
}

/// Load the run file's data, then run its strategy.
pub async fn run_spec(
    spec: &RunSpec,
    provider: &dyn HistoricalDataProvider,
    ctx: &LoadContext,
) -> Result<RunReport, RunError> {
    spec.validate()?;
    let request = spec.data.request(&spec.backtest).map_err(RunSpecError::from)?;
    let loaded = load_historical_data(provider, ctx, &request).await?;
    execute_blocking(spec, loaded).await
}

/// [`run_spec`] whose data load is abandoned when `cancel` reads `true`.
pub async fn run_spec_cancellable(
    spec: &RunSpec,
    provider: &dyn HistoricalDataProvider,
    ctx: &LoadContext,
    cancel: watch::Receiver<bool>,
) -> Result<RunReport, RunError> {
    spec.validate()?;
    let request = spec.data.request(&spec.backtest).map_err(RunSpecError::from)?;
    let loaded = load_historical_data_cancellable(provider, ctx, &request, cancel).await?;
    execute_blocking(spec, loaded).await
}

async fn execute_blocking(spec: &RunSpec, loaded: LoadedData) -> Result<RunReport, RunError> {
    let config = spec.backtest.clone();
    let strategy = spec.strategy.clone();
    let symbol = spec.data.symbol.clone();
    tokio::task::spawn_blocking(move || execute(&config, &strategy, &loaded, &symbol)).await?
}
