//! Parameter sweeps over one shared, immutable series.
//!
//! Each grid point is an independent backtest, so points run in parallel on
//! the rayon pool. Entries are ranked by a [`RankMetric`]; ties keep grid
//! order, so a sweep is reproducible run to run.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use tradesim_core::data::{HistoricalDataProvider, LoadContext};
use tradesim_core::{run_backtest, BacktestConfig, BacktestResult, PriceBar, StrategyParams};

use crate::config::{RankMetric, RunSpec, RunSpecError};
use crate::data_loader::load_historical_data;
use crate::runner::RunError;

/// One ranked grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub label: String,
    pub strategy: StrategyParams,
    pub score: f64,
    pub result: BacktestResult,
}

/// Run every strategy against `bars` and rank the results, best first.
pub fn run_sweep(
    config: &BacktestConfig,
    strategies: &[StrategyParams],
    bars: &[PriceBar],
    rank_by: RankMetric,
) -> Result<Vec<SweepEntry>, RunError> {
    let results = strategies
        .par_iter()
        .map(|params| -> Result<_, RunError> {
            let strategy = params.build()?;
            let result = run_backtest(config, bars, &strategy)?;
            Ok((params.clone(), result))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rank(results, rank_by))
}

fn rank(results: Vec<(StrategyParams, BacktestResult)>, rank_by: RankMetric) -> Vec<SweepEntry> {
    let mut entries: Vec<SweepEntry> = results
        .into_iter()
        .map(|(strategy, result)| {
            let score = rank_by.score(&result);
            SweepEntry {
                rank: 0,
                label: strategy.to_string(),
                strategy,
                score: if score.is_nan() { f64::NEG_INFINITY } else { score },
                result,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.score.total_cmp(&a.score));
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}

/// A completed sweep with the provenance of its shared series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub symbol: String,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub rank_by: RankMetric,
    pub entries: Vec<SweepEntry>,
}

impl SweepReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best(&self) -> Option<&SweepEntry> {
        self.entries.first()
    }

    pub fn top(&self, n: usize) -> &[SweepEntry] {
        &self.entries[..n.min(self.entries.len())]
    }
}

/// Load the run file's data once, then sweep its grid.
pub async fn sweep_spec(
    spec: &RunSpec,
    provider: &dyn HistoricalDataProvider,
    ctx: &LoadContext,
) -> Result<SweepReport, RunError> {
    spec.validate()?;
    let strategies = spec.strategies()?;
    let rank_by = spec.rank_metric();
    let request = spec.data.request(&spec.backtest).map_err(RunSpecError::from)?;
    let loaded = load_historical_data(provider, ctx, &request).await?;

    let config = spec.backtest.clone();
    let bar_count = loaded.bars.len();
    let dataset_hash = loaded.dataset_hash.clone();
    let points = strategies.len();
    let entries = tokio::task::spawn_blocking(move || {
        run_sweep(&config, &strategies, &loaded.bars, rank_by)
    })
    .await??;

    if let Some(best) = entries.first() {
        tracing::info!(
            points,
            rank_by = rank_by.as_str(),
            best = %best.label,
            score = best.score,
            "sweep complete"
        );
    }

    Ok(SweepReport {
        symbol: spec.data.symbol.clone(),
        dataset_hash,
        bar_count,
        rank_by,
        entries,
    })
}
