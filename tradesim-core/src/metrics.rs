//! Performance metrics: pure functions over the equity curve and trade log.
//!
//! Nothing here touches engine state. The engine calls these once, after the
//! last bar, to fill in [`BacktestResult`](crate::engine::BacktestResult).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ExitReason, Trade};

/// Profit factor reported when there are no losing trades.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Per-trade statistics for one run.
///
/// Counts, averages, extremes and streaks are over closed trades. Money
/// totals (gross profit and loss, profit factor, fees) and the exit reason
/// counts cover every record, secured slices included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub trade_count: usize,
    /// Secure-initial slices taken from positions that stayed open.
    #[serde(default)]
    pub partial_exits: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub total_fees: f64,
    pub average_bars_held: f64,
    pub sortino_ratio: f64,
    /// Fraction of bars that ended with at least one open position.
    pub exposure: f64,
    /// Number of trade records per exit reason, keyed by reason name.
    pub exits_by_reason: BTreeMap<String, usize>,
}

impl TradeStatistics {
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[f64],
        bars_in_market: usize,
        bars_per_year: f64,
    ) -> Self {
        let closed: Vec<&Trade> = trades.iter().filter(|t| t.is_closed()).collect();
        let wins: Vec<f64> = closed.iter().filter(|t| t.is_winner()).map(|t| t.profit).collect();
        let losses: Vec<f64> = closed
            .iter()
            .filter(|t| t.profit < 0.0)
            .map(|t| t.profit)
            .collect();
        let (gross_profit, gross_loss) = gross(trades);

        let mut exits_by_reason = BTreeMap::new();
        for trade in trades {
            *exits_by_reason
                .entry(trade.exit_reason.as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            trade_count: closed.len(),
            partial_exits: trades.len() - closed.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            gross_profit,
            gross_loss,
            profit_factor: profit_factor(trades),
            average_win: mean_f64(&wins),
            average_loss: mean_f64(&losses),
            largest_win: wins.iter().copied().fold(0.0, f64::max),
            largest_loss: losses.iter().copied().fold(0.0, f64::min),
            max_consecutive_wins: max_consecutive(&closed, true),
            max_consecutive_losses: max_consecutive(&closed, false),
            total_fees: trades.iter().map(|t| t.fees).sum(),
            average_bars_held: mean_f64(
                &closed.iter().map(|t| t.bars_held as f64).collect::<Vec<_>>(),
            ),
            sortino_ratio: sortino_ratio(equity_curve, bars_per_year),
            exposure: if equity_curve.is_empty() {
                0.0
            } else {
                bars_in_market as f64 / equity_curve.len() as f64
            },
            exits_by_reason,
        }
    }

    pub fn exits(&self, reason: ExitReason) -> usize {
        self.exits_by_reason.get(reason.as_str()).copied().unwrap_or(0)
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Percentage of closed trades with positive profit, in `[0, 100]`.
///
/// Secured slices of a still-open position are not trades of their own.
/// Zero when nothing closed.
pub fn win_rate(trades: &[Trade]) -> f64 {
    let (closed, winners) = trades
        .iter()
        .filter(|t| t.is_closed())
        .fold((0usize, 0usize), |(n, w), t| (n + 1, w + usize::from(t.is_winner())));
    if closed == 0 {
        return 0.0;
    }
    winners as f64 / closed as f64 * 100.0
}

/// Annualized Sharpe ratio of per-bar returns (risk-free rate zero).
///
/// mean / sample std * sqrt(bars_per_year). Zero with fewer than two
/// returns or zero variance.
pub fn sharpe_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * bars_per_year.sqrt()
}

/// Annualized Sortino ratio: like Sharpe, but only downside deviation.
///
/// Zero with fewer than two returns or no negative returns.
pub fn sortino_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq == 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / downside_std * bars_per_year.sqrt()
}

/// Largest peak-to-trough decline, as `(currency, percent)`.
///
/// The running peak starts at `initial_capital`, so an immediate loss counts.
pub fn max_drawdown(equity_curve: &[f64], initial_capital: f64) -> (f64, f64) {
    let mut peak = initial_capital;
    let mut max_abs = 0.0_f64;
    let mut max_pct = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        let decline = peak - eq;
        max_abs = max_abs.max(decline);
        if peak > 0.0 {
            max_pct = max_pct.max(decline / peak * 100.0);
        }
    }
    (max_abs, max_pct)
}

/// Gross profit / gross loss, capped at [`PROFIT_FACTOR_CAP`].
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let (gross_profit, gross_loss) = gross(trades);
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Summed profit of winning records and absolute loss of losing ones.
fn gross(trades: &[Trade]) -> (f64, f64) {
    trades.iter().fold((0.0, 0.0), |(profit, loss), t| {
        if t.profit > 0.0 {
            (profit + t.profit, loss)
        } else if t.profit < 0.0 {
            (profit, loss - t.profit)
        } else {
            (profit, loss)
        }
    })
}

/// Fractional return between consecutive equity values.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[&Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
