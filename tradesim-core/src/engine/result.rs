//! Immutable summary of one run.

use serde::{Deserialize, Serialize};

use crate::config::BacktestConfig;
use crate::domain::Trade;
use crate::metrics::{self, TradeStatistics};

use super::state::RunContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub initial_capital: f64,
    /// Available capital after every position was closed.
    pub final_capital: f64,
    pub total_return: f64,
    pub total_return_percentage: f64,
    /// Every closed quantity in exit order, partial exits included.
    pub trades: Vec<Trade>,
    pub win_rate: f64,
    /// Equity at each bar's close, one entry per input bar.
    pub equity_curve: Vec<f64>,
    /// Percent below the running peak at each bar, one entry per input bar.
    pub drawdown_curve: Vec<f64>,
    pub max_drawdown: f64,
    pub max_drawdown_percentage: f64,
    pub sharpe_ratio: f64,
    pub statistics: TradeStatistics,
    pub peak_open_positions: usize,
}

impl BacktestResult {
    pub(crate) fn from_context(config: &BacktestConfig, ctx: RunContext) -> Self {
        let bars_per_year = config.timeframe.bars_per_year();
        let final_capital = ctx.available_capital;
        let total_return = final_capital - config.initial_capital;
        let (max_drawdown, max_drawdown_percentage) =
            metrics::max_drawdown(&ctx.equity_curve, config.initial_capital);

        Self {
            strategy_name: config.strategy_name.clone(),
            initial_capital: config.initial_capital,
            final_capital,
            total_return,
            total_return_percentage: total_return / config.initial_capital * 100.0,
            win_rate: metrics::win_rate(&ctx.closed_trades),
            sharpe_ratio: metrics::sharpe_ratio(&ctx.equity_curve, bars_per_year),
            statistics: TradeStatistics::compute(
                &ctx.closed_trades,
                &ctx.equity_curve,
                ctx.bars_in_market,
                bars_per_year,
            ),
            max_drawdown,
            max_drawdown_percentage,
            peak_open_positions: ctx.peak_open_positions,
            trades: ctx.closed_trades,
            equity_curve: ctx.equity_curve,
            drawdown_curve: ctx.drawdown_curve,
        }
    }

    /// Closed trades; secured slices of open positions are not counted.
    pub fn trade_count(&self) -> usize {
        self.trades.iter().filter(|t| t.is_closed()).count()
    }

    /// Sum of realized profit over all trade records.
    pub fn realized_profit(&self) -> f64 {
        self.trades.iter().map(|t| t.profit).sum()
    }
}
