//! Exponential Moving Average (EMA) of closes.
//!
//! EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1),
//! seeded with the SMA of the first `period` closes.

use super::{Indicator, IndicatorStream};
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }

    pub fn stream(&self) -> EmaStream {
        EmaStream {
            period: self.period,
            alpha: 2.0 / (self.period as f64 + 1.0),
            seen: 0,
            value: 0.0,
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let mut stream = self.stream();
        bars.iter().map(|bar| stream.push(bar)).collect()
    }
}

/// Running EMA. Holds the seed sum until `period` closes have been seen.
#[derive(Debug, Clone)]
pub struct EmaStream {
    period: usize,
    alpha: f64,
    seen: usize,
    value: f64,
}

impl IndicatorStream for EmaStream {
    fn push(&mut self, bar: &PriceBar) -> f64 {
        self.seen += 1;
        if self.seen <= self.period {
            self.value += bar.close;
            if self.seen < self.period {
                return f64::NAN;
            }
            self.value /= self.period as f64;
        } else {
            self.value = self.alpha * bar.close + (1.0 - self.alpha) * self.value;
        }
        self.value
    }
}
