//! Historical data loading for the runner.
//!
//! Wraps a provider call with series validation and a dataset fingerprint.
//! The cancellable variant races the load against a `watch` signal; a
//! cancelled load returns [`LoadError::Cancelled`] and its partial data is
//! dropped.

use thiserror::Error;
use tokio::sync::watch;

use tradesim_core::data::{
    validate_series, DataError, DataRequest, DataSource, HistoricalDataProvider, LoadContext,
};
use tradesim_core::PriceBar;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data load cancelled")]
    Cancelled,

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// A validated series plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<PriceBar>,
    /// BLAKE3 over every bar, for run fingerprinting.
    pub dataset_hash: String,
    pub source: DataSource,
    pub provider: String,
}

/// Load and validate one series.
pub async fn load_historical_data(
    provider: &dyn HistoricalDataProvider,
    ctx: &LoadContext,
    request: &DataRequest,
) -> Result<LoadedData, LoadError> {
    let bars = provider.load(request, ctx).await?;
    validate_series(&bars)?;
    let dataset_hash = compute_dataset_hash(&bars);

    tracing::info!(
        provider = provider.name(),
        symbol = request.symbol(),
        timeframe = %request.timeframe(),
        bars = bars.len(),
        dataset = &dataset_hash[..12],
        "loaded historical data"
    );

    Ok(LoadedData {
        bars,
        dataset_hash,
        source: provider.source(),
        provider: provider.name().to_string(),
    })
}

/// [`load_historical_data`], abandoned as soon as `cancel` reads `true`.
///
/// A dropped sender never cancels.
pub async fn load_historical_data_cancellable(
    provider: &dyn HistoricalDataProvider,
    ctx: &LoadContext,
    request: &DataRequest,
    cancel: watch::Receiver<bool>,
) -> Result<LoadedData, LoadError> {
    tokio::select! {
        biased;
        () = cancelled(cancel) => {
            tracing::warn!(symbol = request.symbol(), "data load cancelled");
            Err(LoadError::Cancelled)
        }
        loaded = load_historical_data(provider, ctx, request) => loaded,
    }
}

async fn cancelled(mut cancel: watch::Receiver<bool>) {
    if *cancel.borrow_and_update() {
        return;
    }
    while cancel.changed().await.is_ok() {
        if *cancel.borrow_and_update() {
            return;
        }
    }
    std::future::pending::<()>().await;
}

/// Deterministic BLAKE3 hash of a series.
pub fn compute_dataset_hash(bars: &[PriceBar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
