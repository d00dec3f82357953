//! Mutable state of one run. Created by `run_backtest`, consumed into the
//! result, never shared between runs.

use chrono::{DateTime, Utc};

use crate::domain::{Direction, ExitReason, Position, PositionId, PriceBar, Trade, TradeStatus};

use super::costs::CostModel;

pub struct RunContext {
    pub initial_capital: f64,
    pub available_capital: f64,
    pub open_positions: Vec<Position>,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    pub drawdown_curve: Vec<f64>,
    pub running_peak_equity: f64,
    pub peak_open_positions: usize,
    /// Bars that ended with at least one open position.
    pub bars_in_market: usize,
    next_position_id: u64,
}

impl RunContext {
    pub fn new(initial_capital: f64, num_bars: usize) -> Self {
        Self {
            initial_capital,
            available_capital: initial_capital,
            open_positions: Vec::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::with_capacity(num_bars),
            drawdown_curve: Vec::with_capacity(num_bars),
            running_peak_equity: initial_capital,
            peak_open_positions: 0,
            bars_in_market: 0,
            next_position_id: 1,
        }
    }

    /// Cash plus the market value of every open position at its last mark.
    pub fn equity(&self) -> f64 {
        self.available_capital
            + self
                .open_positions
                .iter()
                .map(|p| p.market_value(p.current_price))
                .sum::<f64>()
    }

    pub fn mark_all(&mut self, price: f64) {
        for position in &mut self.open_positions {
            position.mark(price);
        }
    }

    /// Open a position of `notional` at `fill_price`, charging `costs`.
    ///
    /// Stop, target and trailing levels are placed relative to the fill.
    #[allow(clippy::too_many_arguments)]
    pub fn open_position(
        &mut self,
        direction: Direction,
        notional: f64,
        fill_price: f64,
        bar_index: usize,
        bar: &PriceBar,
        stop_loss_pct: f64,
        take_profit_pct: f64,
        trailing_distance: Option<f64>,
        costs: &CostModel,
    ) -> PositionId {
        let id = PositionId(self.next_position_id);
        self.next_position_id += 1;

        let quantity = notional / fill_price;
        let entry_fee = costs.fee(fill_price, quantity);
        self.available_capital -= notional + entry_fee;

        let mut position = Position {
            id,
            direction,
            entry_bar: bar_index,
            entry_time: bar.timestamp,
            entry_price: fill_price,
            quantity,
            stop_loss_price: costs.stop_price(direction, fill_price, stop_loss_pct),
            take_profit_price: direction.favorable_offset(fill_price, take_profit_pct),
            trailing_stop_price: trailing_distance.map(|d| direction.adverse_offset(fill_price, d)),
            secured: false,
            current_price: fill_price,
            unrealized_profit: 0.0,
            entry_fee,
            initial_capital: notional + entry_fee,
        };
        position.mark(bar.close);

        tracing::debug!(
            position = id.0,
            ?direction,
            bar = bar_index,
            fill = fill_price,
            quantity,
            fee = entry_fee,
            "opened position"
        );

        self.open_positions.push(position);
        self.peak_open_positions = self.peak_open_positions.max(self.open_positions.len());
        id
    }

    /// Close `quantity` of the position at `slot` with a trigger at `trigger`.
    ///
    /// A full close removes the position; a partial close shrinks it and
    /// hands it back its share of the entry fee.
    #[allow(clippy::too_many_arguments)]
    pub fn close_quantity(
        &mut self,
        slot: usize,
        quantity: f64,
        trigger: f64,
        reason: ExitReason,
        bar_index: usize,
        exit_time: DateTime<Utc>,
        costs: &CostModel,
    ) -> &Trade {
        let position = &mut self.open_positions[slot];
        let quantity = quantity.min(position.quantity);
        let full = reason != ExitReason::SecureInitial || quantity >= position.quantity;

        let fill = costs.exit_fill(position.direction, trigger);
        let exit_fee = costs.fee(fill, quantity);
        let entry_fee_share = position.entry_fee * (quantity / position.quantity);
        let gross = position.direction.sign() * (fill - position.entry_price) * quantity;
        let profit = gross - entry_fee_share - exit_fee;
        let entry_notional = position.entry_price * quantity;

        self.available_capital += quantity * position.release_per_unit(fill, costs.fee_rate);

        let trade = Trade {
            position_id: position.id,
            direction: position.direction,
            entry_bar: position.entry_bar,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_bar: bar_index,
            exit_time,
            exit_price: fill,
            quantity,
            profit,
            profit_percentage: if entry_notional > 0.0 {
                profit / entry_notional * 100.0
            } else {
                0.0
            },
            fees: entry_fee_share + exit_fee,
            bars_held: bar_index - position.entry_bar,
            status: if full {
                TradeStatus::Closed
            } else {
                TradeStatus::Open
            },
            exit_reason: reason,
        };

        tracing::debug!(
            position = position.id.0,
            bar = bar_index,
            %reason,
            fill,
            quantity,
            profit,
            "closed quantity"
        );

        if full {
            self.open_positions.remove(slot);
        } else {
            position.quantity -= quantity;
            position.entry_fee -= entry_fee_share;
            position.secured = true;
            let mark = position.current_price;
            position.mark(mark);
        }

        self.closed_trades.push(trade);
        &self.closed_trades[self.closed_trades.len() - 1]
    }

    /// Append this bar's equity and drawdown.
    pub fn record_equity(&mut self) -> f64 {
        let equity = self.equity();
        self.running_peak_equity = self.running_peak_equity.max(equity);
        let drawdown = if self.running_peak_equity > 0.0 {
            (self.running_peak_equity - equity) / self.running_peak_equity * 100.0
        } else {
            0.0
        };
        self.equity_curve.push(equity);
        self.drawdown_curve.push(drawdown);
        if !self.open_positions.is_empty() {
            self.bars_in_market += 1;
        }
        equity
    }
}
