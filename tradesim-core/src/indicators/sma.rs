//! Simple Moving Average (SMA) of closes.
//!
//! Lookback: period - 1 (first valid value at index period-1).

use std::collections::VecDeque;

use super::{Indicator, IndicatorStream};
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn stream(&self) -> SmaStream {
        SmaStream {
            period: self.period,
            window: VecDeque::with_capacity(self.period),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }

        let mut sum: f64 = bars[..self.period].iter().map(|b| b.close).sum();
        result[self.period - 1] = sum / self.period as f64;
        for i in self.period..n {
            sum += bars[i].close - bars[i - self.period].close;
            result[i] = sum / self.period as f64;
        }
        result
    }

    fn latest(&self, bars: &[PriceBar]) -> f64 {
        if bars.len() < self.period {
            return f64::NAN;
        }
        let window = &bars[bars.len() - self.period..];
        window.iter().map(|b| b.close).sum::<f64>() / self.period as f64
    }
}

/// Rolling window of the last `period` closes.
///
/// Sums the window oldest first on every push, the same way
/// [`Sma::latest`] does, so both give bit-identical values.
#[derive(Debug, Clone)]
pub struct SmaStream {
    period: usize,
    window: VecDeque<f64>,
}

impl IndicatorStream for SmaStream {
    fn push(&mut self, bar: &PriceBar) -> f64 {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(bar.close);
        if self.window.len() < self.period {
            return f64::NAN;
        }
        self.window.iter().sum::<f64>() / self.period as f64
    }
}
