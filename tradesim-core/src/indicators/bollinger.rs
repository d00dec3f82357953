//! Bollinger Bands: SMA of closes +/- `num_std` population standard deviations.
//!
//! As an [`Indicator`] the series is %B, the close's position inside the
//! bands (0 at the lower band, 1 at the upper).

use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    num_std: f64,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, num_std: f64) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            num_std,
            name: format!("bollinger_{period}_{num_std}"),
        }
    }

    /// Bands over the window ending at the last bar, if there is enough history.
    pub fn bands(&self, bars: &[PriceBar]) -> Option<BollingerBands> {
        if bars.len() < self.period {
            return None;
        }
        let window = &bars[bars.len() - self.period..];
        let n = self.period as f64;
        let mean = window.iter().map(|b| b.close).sum::<f64>() / n;
        let variance = window.iter().map(|b| (b.close - mean).powi(2)).sum::<f64>() / n;
        let width = self.num_std * variance.sqrt();
        Some(BollingerBands {
            upper: mean + width,
            middle: mean,
            lower: mean - width,
        })
    }
}

fn percent_b(close: f64, bands: BollingerBands) -> f64 {
    let span = bands.upper - bands.lower;
    if span == 0.0 {
        0.5
    } else {
        (close - bands.lower) / span
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        (0..bars.len()).map(|i| self.latest(&bars[..=i])).collect()
    }

    fn latest(&self, bars: &[PriceBar]) -> f64 {
        match (self.bands(bars), bars.last()) {
            (Some(bands), Some(bar)) => percent_b(bar.close, bands),
            _ => f64::NAN,
        }
    }
}
