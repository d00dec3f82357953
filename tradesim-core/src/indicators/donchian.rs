//! Donchian channel: highest high and lowest low over a lookback window.

use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DonchianChannel {
    pub upper: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    name: String,
}

impl Donchian {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self {
            period,
            name: format!("donchian_{period}"),
        }
    }

    /// Channel over the `period` bars ending at the last bar (inclusive).
    pub fn channel(&self, bars: &[PriceBar]) -> Option<DonchianChannel> {
        if bars.len() < self.period {
            return None;
        }
        let window = &bars[bars.len() - self.period..];
        Some(DonchianChannel {
            upper: window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
            lower: window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        })
    }

    /// Channel over the `period` bars before the last one, so the last bar
    /// can be tested for a breakout against it.
    pub fn prior_channel(&self, bars: &[PriceBar]) -> Option<DonchianChannel> {
        bars.split_last().and_then(|(_, prior)| self.channel(prior))
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    /// Midline of the channel.
    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        (0..bars.len()).map(|i| self.latest(&bars[..=i])).collect()
    }

    fn latest(&self, bars: &[PriceBar]) -> f64 {
        self.channel(bars)
            .map_or(f64::NAN, |c| (c.upper + c.lower) / 2.0)
    }
}
