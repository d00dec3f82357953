//! Bar-by-bar simulation loop.
//!
//! Per bar, in order:
//! 0. Evaluate the strategy session on the causal prefix
//! 1. Mark open positions to the close
//! 2. Exits: stop-loss, trailing stop, take-profit, secure-initial, signal
//! 3. Entry on a `buy` (or `sell` when shorting is allowed)
//! 4. Record equity and drawdown
//!
//! After the last bar every open position is closed at the last close.

use thiserror::Error;

use crate::config::{BacktestConfig, ConfigError, TradingMode};
use crate::data::{validate_series, DataError};
use crate::domain::{Direction, ExitReason, PriceBar};
use crate::strategy::{SignalAction, Strategy, StrategyError};

use super::result::BacktestResult;
use super::risk::{ExitDecision, ExitRules};
use super::sizing::entry_notional;
use super::state::RunContext;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid price data: {0}")]
    Data(#[from] DataError),

    #[error("strategy '{strategy}' failed at bar {index}: {source}")]
    Strategy {
        strategy: String,
        index: usize,
        #[source]
        source: StrategyError,
    },
}

/// Run one backtest.
///
/// Pure and deterministic: the same config, bars and strategy always give
/// the same result. Config and data problems are reported before the first
/// bar; a strategy error aborts the run with no partial result.
pub fn run_backtest(
    config: &BacktestConfig,
    bars: &[PriceBar],
    strategy: &dyn Strategy,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;
    validate_series(bars)?;

    let rules = ExitRules::from_config(config);
    let costs = rules.costs;
    let mut ctx = RunContext::new(config.initial_capital, bars.len());
    let mut session = strategy.session();

    for (index, bar) in bars.iter().enumerate() {
        let signal = session
            .evaluate(&bars[..=index], index)
            .map_err(|source| BacktestError::Strategy {
                strategy: strategy.name().to_string(),
                index,
                source,
            })?;

        ctx.mark_all(bar.close);
        process_exits(&mut ctx, &rules, bar, index, signal.action);

        if let Some(direction) = entry_direction(signal.action, config.trading_mode) {
            if ctx.open_positions.len() < config.max_positions {
                let equity = ctx.equity();
                match entry_notional(config, equity, ctx.available_capital, costs.fee_rate) {
                    Some(notional) => {
                        let fill = costs.entry_fill(direction, bar.close);
                        ctx.open_position(
                            direction,
                            notional,
                            fill,
                            index,
                            bar,
                            config.stop_loss,
                            config.take_profit,
                            rules.trailing_distance,
                            &costs,
                        );
                    }
                    None => tracing::debug!(bar = index, equity, "entry skipped: no capital"),
                }
            }
        }

        ctx.record_equity();
    }

    if let Some((last_index, last_bar)) = bars.iter().enumerate().last() {
        while !ctx.open_positions.is_empty() {
            ctx.close_quantity(
                0,
                f64::INFINITY,
                last_bar.close,
                ExitReason::EndOfBacktest,
                last_index,
                last_bar.timestamp,
                &costs,
            );
        }
    }

    let result = BacktestResult::from_context(config, ctx);
    tracing::info!(
        strategy = %result.strategy_name,
        bars = bars.len(),
        trades = result.trades.len(),
        final_capital = result.final_capital,
        return_pct = result.total_return_percentage,
        max_drawdown_pct = result.max_drawdown_percentage,
        sharpe = result.sharpe_ratio,
        "backtest complete"
    );
    Ok(result)
}

fn process_exits(
    ctx: &mut RunContext,
    rules: &ExitRules,
    bar: &PriceBar,
    index: usize,
    signal: SignalAction,
) {
    let mut slot = 0;
    while slot < ctx.open_positions.len() {
        match rules.evaluate(&mut ctx.open_positions[slot], bar, signal) {
            ExitDecision::Hold => slot += 1,
            ExitDecision::Full { reason, trigger } => {
                ctx.close_quantity(slot, f64::INFINITY, trigger, reason, index, bar.timestamp, &rules.costs);
            }
            ExitDecision::SecurePartial { quantity, trigger } => {
                ctx.close_quantity(
                    slot,
                    quantity,
                    trigger,
                    ExitReason::SecureInitial,
                    index,
                    bar.timestamp,
                    &rules.costs,
                );
                slot += 1;
            }
        }
    }
}

fn entry_direction(action: SignalAction, mode: TradingMode) -> Option<Direction> {
    match (action, mode) {
        (SignalAction::Buy, _) => Some(Direction::Long),
        (SignalAction::Sell, TradingMode::LongShort) => Some(Direction::Short),
        _ => None,
    }
}
