//! Indicators used by the built-in strategies.
//!
//! Every indicator reads close/high/low from a causal bar prefix and returns
//! one value per bar, `NaN` during warm-up. Strategies usually only need the
//! newest value, so [`Indicator::latest`] exists to let windowed indicators
//! skip the full-series pass. Recursive indicators (EMA, RSI) also come as an
//! [`IndicatorStream`] that a strategy session feeds one bar at a time.

pub mod bollinger;
pub mod donchian;
pub mod ema;
pub mod rsi;
pub mod sma;

pub use bollinger::{Bollinger, BollingerBands};
pub use donchian::{Donchian, DonchianChannel};
pub use ema::{Ema, EmaStream};
pub use rsi::{Rsi, RsiStream};
pub use sma::{Sma, SmaStream};

use crate::domain::PriceBar;

pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the whole series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`; the first
    /// `lookback()` values are `NaN`.
    fn compute(&self, bars: &[PriceBar]) -> Vec<f64>;

    /// Value at the last bar of `bars`.
    fn latest(&self, bars: &[PriceBar]) -> f64 {
        self.compute(bars).last().copied().unwrap_or(f64::NAN)
    }
}

/// Incremental form of an indicator.
///
/// Bars must be pushed in order, starting from the first bar of the series.
/// After `k` pushes the returned value equals `compute(&bars[..k]).last()`.
pub trait IndicatorStream: Send {
    fn push(&mut self, bar: &PriceBar) -> f64;
}

/// Build bars from closes: open = previous close, high/low one point outside.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    use chrono::{Duration, TimeZone, Utc};
    let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                timestamp: t0 + Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
