//! Deterministic synthetic price series.
//!
//! A bounded random walk seeded from BLAKE3 of `(seed, symbol, timeframe)`,
//! so the same request always yields the same bars while different symbols
//! and granularities diverge. One bar per timeframe step covers the whole
//! request window; weekends are not skipped.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::context::LoadContext;
use super::provider::{DataError, DataRequest, DataSource, HistoricalDataProvider};
use crate::domain::{PriceBar, Timeframe};

/// Half-width of the uniform per-bar return for daily bars.
const DAILY_RETURN_RANGE: f64 = 0.03;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
    start_price: f64,
    latency: Option<Duration>,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_price: 100.0,
            latency: None,
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    /// Sleep this long inside every `load`, imitating a remote source.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Build the series for `request` without any simulated latency.
    pub fn generate(&self, request: &DataRequest) -> Vec<PriceBar> {
        let timeframe = request.timeframe();
        let mut rng = StdRng::from_seed(self.seed_for(request.symbol(), timeframe));

        let step = timeframe.duration();
        let scale = (timeframe.minutes() as f64 / 1_440.0).sqrt();
        let return_range = DAILY_RETURN_RANGE * scale;
        let volume_scale = timeframe.minutes() as f64 / 1_440.0;

        let end = request.window_end();
        let mut ts = request.window_start();
        let mut price = self.start_price;
        let mut bars = Vec::new();

        while ts < end {
            let bar_return: f64 = rng.gen_range(-return_range..return_range);
            let open = price;
            let close = price * (1.0 + bar_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01 * scale));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01 * scale));
            let volume = rng.gen_range(500_000.0..5_000_000.0) * volume_scale;

            bars.push(PriceBar {
                timestamp: ts,
                open,
                high,
                low,
                close,
                volume: volume.round(),
            });

            price = close;
            ts += step;
        }

        bars
    }

    fn seed_for(&self, symbol: &str, timeframe: Timeframe) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(timeframe.as_str().as_bytes());
        *hasher.finalize().as_bytes()
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new(42)
    }
}

#[async_trait]
impl HistoricalDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    async fn load(
        &self,
        request: &DataRequest,
        _ctx: &LoadContext,
    ) -> Result<Vec<PriceBar>, DataError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let bars = self.generate(request);
        if bars.is_empty() {
            return Err(DataError::Empty);
        }
        tracing::debug!(
            symbol = request.symbol(),
            timeframe = %request.timeframe(),
            bars = bars.len(),
            "generated synthetic series"
        );
        Ok(bars)
    }
}
