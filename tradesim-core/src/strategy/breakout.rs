//! Donchian channel breakout.
//!
//! Buys when the close clears the highest high of the previous `lookback`
//! bars and sells when it breaks the lowest low.

use super::{causal_prefix, Signal, Strategy, StrategyError};
use crate::domain::PriceBar;
use crate::indicators::Donchian;

pub struct Breakout {
    channel: Donchian,
}

impl Breakout {
    pub fn new(lookback: usize) -> Self {
        Self {
            channel: Donchian::new(lookback),
        }
    }
}

impl Strategy for Breakout {
    fn name(&self) -> &str {
        "breakout"
    }

    fn evaluate(&self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        let bars = causal_prefix(bars, index)?;
        let Some(channel) = self.channel.prior_channel(bars) else {
            return Ok(Signal::hold());
        };
        let close = bars[index].close;
        let width = (channel.upper - channel.lower).max(f64::EPSILON);

        let signal = if close > channel.upper {
            Signal::buy(0.5 + (close - channel.upper) / width)
        } else if close < channel.lower {
            Signal::sell(0.5 + (channel.lower - close) / width)
        } else {
            return Ok(Signal::hold());
        };
        Ok(signal
            .with_meta("channel_upper", channel.upper)
            .with_meta("channel_lower", channel.lower))
    }
}
