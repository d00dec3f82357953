//! Moving average crossover: golden cross buys, death cross sells.

use serde::{Deserialize, Serialize};

use super::{causal_prefix, Signal, Strategy, StrategyError, StrategySession};
use crate::domain::PriceBar;
use crate::indicators::{Ema, Indicator, IndicatorStream, Sma};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaType {
    Sma,
    #[default]
    Ema,
}

impl MaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaType::Sma => "sma",
            MaType::Ema => "ema",
        }
    }
}

#[derive(Debug, Clone)]
enum MovingAverage {
    Sma(Sma),
    Ema(Ema),
}

impl MovingAverage {
    fn new(ma_type: MaType, period: usize) -> Self {
        match ma_type {
            MaType::Sma => MovingAverage::Sma(Sma::new(period)),
            MaType::Ema => MovingAverage::Ema(Ema::new(period)),
        }
    }

    fn latest(&self, bars: &[PriceBar]) -> f64 {
        match self {
            MovingAverage::Sma(sma) => sma.latest(bars),
            MovingAverage::Ema(ema) => ema.latest(bars),
        }
    }

    fn stream(&self) -> Box<dyn IndicatorStream> {
        match self {
            MovingAverage::Sma(sma) => Box::new(sma.stream()),
            MovingAverage::Ema(ema) => Box::new(ema.stream()),
        }
    }
}

/// Fires `buy` on the bar where the fast MA closes above the slow MA after
/// being at or below it, and `sell` on the opposite cross.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    fast: MovingAverage,
    slow: MovingAverage,
    slow_period: usize,
}

impl MaCrossover {
    pub fn new(fast_period: usize, slow_period: usize, ma_type: MaType) -> Self {
        Self {
            fast: MovingAverage::new(ma_type, fast_period),
            slow: MovingAverage::new(ma_type, slow_period),
            slow_period,
        }
    }

    /// Signal at `index` from the (fast, slow) pair at the previous and
    /// current bar.
    fn decide(&self, index: usize, prev: (f64, f64), cur: (f64, f64)) -> Signal {
        let ((fast_prev, slow_prev), (fast_cur, slow_cur)) = (prev, cur);
        if index < self.slow_period
            || [fast_prev, slow_prev, fast_cur, slow_cur].iter().any(|v| v.is_nan())
        {
            return Signal::hold();
        }

        // Separation relative to the slow MA, saturating at 5%.
        let confidence = ((fast_cur - slow_cur).abs() / slow_cur * 20.0).max(0.1);
        let signal = if fast_cur > slow_cur && fast_prev <= slow_prev {
            Signal::buy(confidence)
        } else if fast_cur < slow_cur && fast_prev >= slow_prev {
            Signal::sell(confidence)
        } else {
            return Signal::hold();
        };
        signal
            .with_meta("fast_ma", fast_cur)
            .with_meta("slow_ma", slow_cur)
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn evaluate(&self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        let bars = causal_prefix(bars, index)?;
        if index < self.slow_period {
            return Ok(Signal::hold());
        }

        let prev = &bars[..index];
        Ok(self.decide(
            index,
            (self.fast.latest(prev), self.slow.latest(prev)),
            (self.fast.latest(bars), self.slow.latest(bars)),
        ))
    }

    fn session(&self) -> Box<dyn StrategySession + '_> {
        Box::new(CrossoverSession::new(self))
    }
}

/// Streams both averages so each bar costs one push per average.
struct CrossoverSession<'a> {
    strategy: &'a MaCrossover,
    fast: Box<dyn IndicatorStream>,
    slow: Box<dyn IndicatorStream>,
    next: usize,
    prev: (f64, f64),
    cur: (f64, f64),
}

impl<'a> CrossoverSession<'a> {
    fn new(strategy: &'a MaCrossover) -> Self {
        Self {
            strategy,
            fast: strategy.fast.stream(),
            slow: strategy.slow.stream(),
            next: 0,
            prev: (f64::NAN, f64::NAN),
            cur: (f64::NAN, f64::NAN),
        }
    }

    fn push(&mut self, bar: &PriceBar) {
        self.prev = self.cur;
        self.cur = (self.fast.push(bar), self.slow.push(bar));
        self.next += 1;
    }
}

impl StrategySession for CrossoverSession<'_> {
    fn evaluate(&mut self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        let bars = causal_prefix(bars, index)?;
        if index != self.next {
            *self = CrossoverSession::new(self.strategy);
            for bar in &bars[..index] {
                self.push(bar);
            }
        }
        self.push(&bars[index]);
        Ok(self.strategy.decide(index, self.prev, self.cur))
    }
}
