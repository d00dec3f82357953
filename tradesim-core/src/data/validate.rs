//! Series validation run before any simulation.

use super::provider::DataError;
use crate::domain::PriceBar;

/// Check that `bars` is non-empty, strictly increasing in time, and that
/// every bar passes [`PriceBar::is_sane`].
pub fn validate_series(bars: &[PriceBar]) -> Result<(), DataError> {
    if bars.is_empty() {
        return Err(DataError::Empty);
    }
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(DataError::InvalidBar {
                index,
                reason: describe_insane(bar).to_string(),
            });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(DataError::NonChronological { index });
        }
    }
    Ok(())
}

fn describe_insane(bar: &PriceBar) -> &'static str {
    if bar.has_non_finite() {
        "non-finite value"
    } else if bar.low <= 0.0 {
        "non-positive price"
    } else if bar.volume < 0.0 {
        "negative volume"
    } else {
        "high/low do not envelope open/close"
    }
}
