//! Position sizing for new entries.

use crate::config::BacktestConfig;

/// Entries smaller than this notional are skipped as dust.
pub const MIN_NOTIONAL: f64 = 1e-6;

/// Notional for a new position, or `None` if nothing meaningful fits.
///
/// The smaller of the equity cap (`max_position_size`) and the risk budget
/// (`risk_per_trade` of equity lost at the stop), then cut so that notional
/// plus entry fee fits in `available`.
pub fn entry_notional(
    config: &BacktestConfig,
    equity: f64,
    available: f64,
    fee_rate: f64,
) -> Option<f64> {
    if equity <= 0.0 || available <= 0.0 {
        return None;
    }
    let by_size = equity * config.max_position_size / 100.0;
    let by_risk = equity * (config.risk_per_trade / 100.0) / (config.stop_loss / 100.0);
    let affordable = available / (1.0 + fee_rate);
    let notional = by_size.min(by_risk).min(affordable);
    (notional >= MIN_NOTIONAL).then_some(notional)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_size: f64, risk: f64, stop: f64) -> BacktestConfig {
        let mut c = BacktestConfig::default();
        c.max_position_size = max_size;
        c.risk_per_trade = risk;
        c.stop_loss = stop;
        c
    }

    #[test]
    fn equity_cap_binds() {
        let n = entry_notional(&config(50.0, 100.0, 5.0), 10_000.0, 10_000.0, 0.0).unwrap();
        assert!((n - 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn risk_budget_binds() {
        // 2% risk with a 5% stop: 40% of equity
        let n = entry_notional(&config(100.0, 2.0, 5.0), 10_000.0, 10_000.0, 0.0).unwrap();
        assert!((n - 4_000.0).abs() < 1e-9);
    }

    #[test]
    fn cash_and_fee_bind() {
        let n = entry_notional(&config(100.0, 100.0, 5.0), 10_000.0, 1_001.0, 0.001).unwrap();
        assert!((n * 1.001 - 1_001.0).abs() < 1e-9);
    }

    #[test]
    fn dust_and_broke_are_skipped() {
        let c = config(100.0, 100.0, 5.0);
        assert_eq!(entry_notional(&c, 10_000.0, 0.0, 0.0), None);
        assert_eq!(entry_notional(&c, 10_000.0, 1e-9, 0.0), None);
        assert_eq!(entry_notional(&c, -5.0, 100.0, 0.0), None);
    }
}
