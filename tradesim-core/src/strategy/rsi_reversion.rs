//! RSI mean reversion: buy oversold, sell overbought.

use super::{causal_prefix, Signal, Strategy, StrategyError, StrategySession};
use crate::domain::PriceBar;
use crate::indicators::{Indicator, IndicatorStream, Rsi, RsiStream};

#[derive(Debug, Clone)]
pub struct RsiReversion {
    rsi: Rsi,
    oversold: f64,
    overbought: f64,
}

impl RsiReversion {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        Self {
            rsi: Rsi::new(period),
            oversold,
            overbought,
        }
    }

    fn decide(&self, rsi: f64) -> Signal {
        if rsi.is_nan() {
            return Signal::hold();
        }
        let signal = if rsi < self.oversold {
            Signal::buy((self.oversold - rsi) / self.oversold)
        } else if rsi > self.overbought {
            Signal::sell((rsi - self.overbought) / (100.0 - self.overbought))
        } else {
            Signal::hold()
        };
        signal.with_meta("rsi", rsi)
    }
}

impl Strategy for RsiReversion {
    fn name(&self) -> &str {
        "rsi_reversion"
    }

    fn evaluate(&self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        let bars = causal_prefix(bars, index)?;
        Ok(self.decide(self.rsi.latest(bars)))
    }

    fn session(&self) -> Box<dyn StrategySession + '_> {
        Box::new(RsiSession {
            strategy: self,
            rsi: self.rsi.stream(),
            next: 0,
        })
    }
}

struct RsiSession<'a> {
    strategy: &'a RsiReversion,
    rsi: RsiStream,
    next: usize,
}

impl StrategySession for RsiSession<'_> {
    fn evaluate(&mut self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        let bars = causal_prefix(bars, index)?;
        if index != self.next {
            self.rsi = self.strategy.rsi.stream();
            for bar in &bars[..index] {
                self.rsi.push(bar);
            }
        }
        let rsi = self.rsi.push(&bars[index]);
        self.next = index + 1;
        Ok(self.strategy.decide(rsi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::strategy::SignalAction;

    #[test]
    fn falling_prices_are_oversold() {
        let bars = make_bars(&[10.0, 9.0, 8.0, 7.0, 6.0]);
        let signal = RsiReversion::new(3, 30.0, 70.0).evaluate(&bars, 4).unwrap();
        assert!(signal.is_buy());
        assert_eq!(signal.metadata["rsi"], 0.0);
        assert_eq!(signal.confidence, 1.0);
    }

    #[test]
    fn rising_prices_are_overbought() {
        let bars = make_bars(&[6.0, 7.0, 8.0, 9.0, 10.0]);
        let signal = RsiReversion::new(3, 30.0, 70.0).evaluate(&bars, 4).unwrap();
        assert!(signal.is_sell());
    }

    #[test]
    fn session_matches_evaluate_bar_by_bar() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 100.0 + (i as f64 * 0.17).sin() * 12.0 + (i as f64 * 1.3).cos())
            .collect();
        let bars = make_bars(&closes);
        let s = RsiReversion::new(14, 30.0, 70.0);
        let mut session = s.session();
        let mut trades = 0;
        for i in 0..bars.len() {
            let expected = s.evaluate(&bars, i).unwrap();
            assert_eq!(session.evaluate(&bars, i).unwrap(), expected, "bar {i}");
            trades += usize::from(expected.action != SignalAction::Hold);
        }
        assert!(trades > 0);

        // Jumping back rebuilds from the prefix.
        assert_eq!(session.evaluate(&bars, 50).unwrap(), s.evaluate(&bars, 50).unwrap());
        assert_eq!(session.evaluate(&bars, 51).unwrap(), s.evaluate(&bars, 51).unwrap());
    }

    #[test]
    fn neutral_and_warm_up_hold() {
        let bars = make_bars(&[10.0, 11.0, 10.0, 11.0, 10.0]);
        let s = RsiReversion::new(4, 30.0, 70.0);
        assert_eq!(s.evaluate(&bars, 4).unwrap().action, SignalAction::Hold);
        assert_eq!(s.evaluate(&bars, 2).unwrap(), Signal::hold());
    }
}
