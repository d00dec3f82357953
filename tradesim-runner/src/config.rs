//! TOML run files.
//!
//! A run file names the data to load, the risk configuration and the
//! strategy, and optionally a parameter grid for sweeps:
//!
//! ```toml
//! [data]
//! symbol = "BTC-USD"
//! provider = "synthetic"
//! seed = 7
//!
//! [backtest]
//! strategy_name = "trend"
//! initial_capital = 10000.0
//! start_date = "2023-01-01"
//! end_date = "2023-12-31"
//! timeframe = "1d"
//! take_profit = 10.0
//! stop_loss = 5.0
//!
//! [strategy]
//! kind = "ma_crossover"
//! fast_period = 10
//! slow_period = 50
//!
//! [sweep]
//! rank_by = "sharpe_ratio"
//!
//! [sweep.grid]
//! fast_period = [5, 10, 20]
//! slow_period = [50, 100]
//! ```
//!
//! Every table rejects keys it does not know.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradesim_core::data::{
    CsvProvider, DataError, DataRequest, HistoricalDataProvider, LoadContext, SyntheticProvider,
    YahooProvider,
};
use tradesim_core::{BacktestConfig, BacktestResult, ConfigError, StrategyError, StrategyParams};

/// Errors from reading or interpreting a run file.
#[derive(Debug, Error)]
pub enum RunSpecError {
    #[error("failed to read run file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse run file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("[data] provider 'csv' requires csv_dir")]
    MissingCsvDir,

    #[error("invalid [sweep] section: {0}")]
    Sweep(String),
}

/// Which historical data provider serves the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Synthetic,
    Csv,
    Yahoo,
}

/// The `[data]` table. Dates and timeframe come from `[backtest]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSpec {
    pub symbol: String,
    #[serde(default)]
    pub provider: ProviderKind,
    /// Seed for the synthetic provider.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Directory of `<SYMBOL>_<timeframe>.csv` files for the CSV provider.
    #[serde(default)]
    pub csv_dir: Option<PathBuf>,
    /// Simulated latency for the synthetic provider.
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

fn default_seed() -> u64 {
    42
}

impl DataSpec {
    /// The request covering the backtest's date range at its timeframe.
    pub fn request(&self, config: &BacktestConfig) -> Result<DataRequest, DataError> {
        DataRequest::with_timeframe(
            self.symbol.clone(),
            config.start_date,
            config.end_date,
            config.timeframe,
        )
    }

    pub fn build_provider(&self) -> Result<Arc<dyn HistoricalDataProvider>, RunSpecError> {
        let provider: Arc<dyn HistoricalDataProvider> = match self.provider {
            ProviderKind::Synthetic => {
                let mut provider = SyntheticProvider::new(self.seed);
                if let Some(ms) = self.latency_ms {
                    provider = provider.with_latency(Duration::from_millis(ms));
                }
                Arc::new(provider)
            }
            ProviderKind::Csv => {
                let dir = self.csv_dir.clone().ok_or(RunSpecError::MissingCsvDir)?;
                Arc::new(CsvProvider::new(dir))
            }
            ProviderKind::Yahoo => Arc::new(YahooProvider::new()?),
        };
        Ok(provider)
    }

    /// A fresh load context sized for the provider.
    pub fn load_context(&self) -> LoadContext {
        match self.provider {
            ProviderKind::Yahoo => LoadContext::for_network(),
            ProviderKind::Synthetic | ProviderKind::Csv => LoadContext::default(),
        }
    }
}

/// Result field used to order sweep entries, best first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    #[default]
    SharpeRatio,
    TotalReturn,
    MaxDrawdown,
    WinRate,
    ProfitFactor,
}

impl RankMetric {
    /// Score where higher is better.
    pub fn score(&self, result: &BacktestResult) -> f64 {
        match self {
            RankMetric::SharpeRatio => result.sharpe_ratio,
            RankMetric::TotalReturn => result.total_return_percentage,
            RankMetric::MaxDrawdown => -result.max_drawdown_percentage,
            RankMetric::WinRate => result.win_rate,
            RankMetric::ProfitFactor => result.statistics.profit_factor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RankMetric::SharpeRatio => "sharpe_ratio",
            RankMetric::TotalReturn => "total_return",
            RankMetric::MaxDrawdown => "max_drawdown",
            RankMetric::WinRate => "win_rate",
            RankMetric::ProfitFactor => "profit_factor",
        }
    }
}

/// The optional `[sweep]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepSpec {
    #[serde(default)]
    pub rank_by: RankMetric,
    /// Strategy parameter name to the values it takes.
    #[serde(default)]
    pub grid: BTreeMap<String, Vec<serde_json::Value>>,
}

impl SweepSpec {
    /// Number of grid points before invalid combinations are dropped.
    pub fn size(&self) -> usize {
        self.grid.values().map(Vec::len).product()
    }

    /// Expand the grid over `base`, keeping only valid parameter sets.
    ///
    /// Points are produced in a fixed order (keys sorted, values in file
    /// order), so the same grid always yields the same list.
    pub fn expand(&self, base: &StrategyParams) -> Result<Vec<StrategyParams>, RunSpecError> {
        if self.grid.contains_key("kind") {
            return Err(RunSpecError::Sweep("'kind' cannot be swept".into()));
        }
        if let Some((key, _)) = self.grid.iter().find(|(_, values)| values.is_empty()) {
            return Err(RunSpecError::Sweep(format!("'{key}' has no values")));
        }

        let base = serde_json::to_value(base).map_err(|e| RunSpecError::Sweep(e.to_string()))?;
        let mut points = vec![base];
        for (key, values) in &self.grid {
            points = points
                .into_iter()
                .flat_map(|point| {
                    values.iter().map(move |value| {
                        let mut next = point.clone();
                        if let Some(map) = next.as_object_mut() {
                            map.insert(key.clone(), value.clone());
                        }
                        next
                    })
                })
                .collect();
        }

        let mut strategies = Vec::with_capacity(points.len());
        for point in points {
            let params: StrategyParams = serde_json::from_value(point)
                .map_err(|e| RunSpecError::Sweep(e.to_string()))?;
            match params.validate() {
                Ok(()) => strategies.push(params),
                Err(e) => tracing::debug!(%params, error = %e, "skipping invalid grid point"),
            }
        }

        if strategies.is_empty() {
            return Err(RunSpecError::Sweep(
                "no valid parameter combinations in grid".into(),
            ));
        }
        Ok(strategies)
    }
}

/// A complete run file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSpec {
    pub data: DataSpec,
    pub backtest: BacktestConfig,
    pub strategy: StrategyParams,
    #[serde(default)]
    pub sweep: Option<SweepSpec>,
}

impl RunSpec {
    pub fn from_toml(content: &str) -> Result<Self, RunSpecError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, RunSpecError> {
        let content = std::fs::read_to_string(path).map_err(|source| RunSpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Check every section without touching any data source.
    pub fn validate(&self) -> Result<(), RunSpecError> {
        self.backtest.validate()?;
        self.strategy.validate()?;
        self.data.request(&self.backtest)?;
        if self.data.provider == ProviderKind::Csv && self.data.csv_dir.is_none() {
            return Err(RunSpecError::MissingCsvDir);
        }
        if let Some(sweep) = &self.sweep {
            sweep.expand(&self.strategy)?;
        }
        Ok(())
    }

    /// Strategies to run: the grid expansion when `[sweep]` is present,
    /// otherwise the single `[strategy]`.
    pub fn strategies(&self) -> Result<Vec<StrategyParams>, RunSpecError> {
        match &self.sweep {
            Some(sweep) => sweep.expand(&self.strategy),
            None => Ok(vec![self.strategy.clone()]),
        }
    }

    pub fn rank_metric(&self) -> RankMetric {
        self.sweep.as_ref().map(|s| s.rank_by).unwrap_or_default()
    }
}
