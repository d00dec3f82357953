//! Bollinger band mean reversion: buy below the lower band, sell above the upper.

use super::{causal_prefix, Signal, Strategy, StrategyError};
use crate::domain::PriceBar;
use crate::indicators::Bollinger;

pub struct BollingerReversion {
    bands: Bollinger,
}

impl BollingerReversion {
    pub fn new(period: usize, num_std: f64) -> Self {
        Self {
            bands: Bollinger::new(period, num_std),
        }
    }
}

impl Strategy for BollingerReversion {
    fn name(&self) -> &str {
        "bollinger_reversion"
    }

    fn evaluate(&self, bars: &[PriceBar], index: usize) -> Result<Signal, StrategyError> {
        let bars = causal_prefix(bars, index)?;
        let Some(bands) = self.bands.bands(bars) else {
            return Ok(Signal::hold());
        };
        let close = bars[index].close;
        let half_width = bands.upper - bands.middle;
        if half_width <= 0.0 {
            return Ok(Signal::hold());
        }

        let signal = if close < bands.lower {
            Signal::buy((bands.lower - close) / half_width + 0.5)
        } else if close > bands.upper {
            Signal::sell((close - bands.upper) / half_width + 0.5)
        } else {
            return Ok(Signal::hold());
        };
        Ok(signal
            .with_meta("upper_band", bands.upper)
            .with_meta("middle_band", bands.middle)
            .with_meta("lower_band", bands.lower))
    }
}
