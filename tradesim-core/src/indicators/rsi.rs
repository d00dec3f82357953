//! Relative Strength Index (RSI) with Wilder smoothing.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss). Lookback: period.
//! avg_loss == 0 gives 100; avg_gain == 0 gives 0.

use super::{Indicator, IndicatorStream};
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }

    pub fn stream(&self) -> RsiStream {
        RsiStream {
            period: self.period,
            prev_close: None,
            changes: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[PriceBar]) -> Vec<f64> {
        let mut stream = self.stream();
        bars.iter().map(|bar| stream.push(bar)).collect()
    }
}

/// Running RSI. The first `period` changes are averaged, later ones smoothed
/// with alpha = 1 / period.
#[derive(Debug, Clone)]
pub struct RsiStream {
    period: usize,
    prev_close: Option<f64>,
    changes: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl IndicatorStream for RsiStream {
    fn push(&mut self, bar: &PriceBar) -> f64 {
        let prev = match self.prev_close.replace(bar.close) {
            Some(prev) => prev,
            None => return f64::NAN,
        };
        let ch = bar.close - prev;
        self.changes += 1;
        let period = self.period as f64;

        if self.changes <= self.period {
            if ch > 0.0 {
                self.avg_gain += ch;
            } else {
                self.avg_loss -= ch;
            }
            if self.changes < self.period {
                return f64::NAN;
            }
            self.avg_gain /= period;
            self.avg_loss /= period;
        } else {
            let alpha = 1.0 / period;
            self.avg_gain = alpha * ch.max(0.0) + (1.0 - alpha) * self.avg_gain;
            self.avg_loss = alpha * (-ch).max(0.0) + (1.0 - alpha) * self.avg_loss;
        }
        rsi_from(self.avg_gain, self.avg_loss)
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn all_gains_is_100() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let result = Rsi::new(3).compute(&bars);
        assert!(result[2].is_nan());
        assert_approx(result[3], 100.0, DEFAULT_EPSILON);
        assert_approx(result[4], 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn all_losses_is_0() {
        let bars = make_bars(&[5.0, 4.0, 3.0, 2.0]);
        assert_approx(Rsi::new(3).latest(&bars), 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn flat_is_neutral() {
        let bars = make_bars(&[7.0; 6]);
        assert_approx(Rsi::new(3).latest(&bars), 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn balanced_moves_near_50() {
        // +1, -1, +1, -1 over four changes: avg gain == avg loss
        let bars = make_bars(&[10.0, 11.0, 10.0, 11.0, 10.0]);
        assert_approx(Rsi::new(4).latest(&bars), 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn stream_matches_latest_on_every_prefix() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.9).cos() * 4.0).collect();
        let bars = make_bars(&closes);
        let rsi = Rsi::new(6);
        let mut stream = rsi.stream();
        for end in 1..=bars.len() {
            let pushed = stream.push(&bars[end - 1]);
            let expected = rsi.latest(&bars[..end]);
            if end <= 6 {
                assert!(pushed.is_nan() && expected.is_nan(), "bar {end}");
            } else {
                assert_eq!(pushed, expected, "bar {end}");
            }
        }
    }

    #[test]
    fn stays_in_range() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        for v in Rsi::new(14).compute(&bars).into_iter().filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
