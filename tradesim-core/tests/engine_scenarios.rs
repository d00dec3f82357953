//! End-to-end engine scenarios with hand-built bar series.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tradesim_core::data::{DataError, DataRequest, SyntheticProvider};
use tradesim_core::domain::{Direction, ExitReason, PriceBar, TradeStatus};
use tradesim_core::engine::{run_backtest, BacktestError, BacktestResult};
use tradesim_core::strategy::{FnStrategy, Signal, SignalAction, Strategy, StrategyError};
use tradesim_core::{BacktestConfig, StrategyParams, TradingMode};

// ── Helpers ──────────────────────────────────────────────────────────

fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i as i64)
}

fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> PriceBar {
    PriceBar {
        timestamp: ts(i),
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

fn flat(i: usize, price: f64) -> PriceBar {
    bar(i, price, price, price, price)
}

fn wave_bars(n: usize) -> Vec<PriceBar> {
    let mut prev = 100.0;
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.3).sin() * 10.0;
            let b = bar(i, prev, prev.max(close) + 0.5, prev.min(close) - 0.5, close);
            prev = close;
            b
        })
        .collect()
}

fn synthetic_bars(days: u32) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let end = start + Duration::days(days as i64 - 1);
    let request = DataRequest::new("SYN", start, end, "1d").unwrap();
    SyntheticProvider::new(11).generate(&request)
}

/// Emits the scripted action at each listed index, `hold` elsewhere.
fn scripted(script: Vec<(usize, SignalAction)>) -> impl Strategy {
    FnStrategy::new("scripted", move |_: &[PriceBar], i: usize| {
        let action = script
            .iter()
            .find(|(at, _)| *at == i)
            .map_or(SignalAction::Hold, |(_, a)| *a);
        Ok(Signal::new(action, 1.0))
    })
}

fn always(action: SignalAction) -> impl Strategy {
    FnStrategy::new("always", move |_: &[PriceBar], _: usize| Ok(Signal::new(action, 1.0)))
}

fn config() -> BacktestConfig {
    BacktestConfig::new("test", 10_000.0)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn assert_capital_identity(result: &BacktestResult) {
    let expected = result.initial_capital + result.realized_profit();
    assert!(
        (result.final_capital - expected).abs() < 1e-6 * result.initial_capital,
        "final {} != initial + profits {}",
        result.final_capital,
        expected
    );
}

fn assert_curve_lengths(result: &BacktestResult, bars: &[PriceBar]) {
    assert_eq!(result.equity_curve.len(), bars.len());
    assert_eq!(result.drawdown_curve.len(), bars.len());
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn flat_market_single_entry_ends_at_backtest_end() {
    let bars: Vec<_> = (0..30).map(|i| flat(i, 100.0)).collect();
    let result = run_backtest(&config(), &bars, &scripted(vec![(5, SignalAction::Buy)])).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::EndOfBacktest);
    assert_eq!(trade.status, TradeStatus::Closed);
    assert_eq!((trade.entry_bar, trade.exit_bar, trade.bars_held), (5, 29, 24));
    assert!(approx(trade.profit, 0.0));
    assert!(approx(result.final_capital, 10_000.0));
    assert_eq!(result.win_rate, 0.0);
    assert_eq!(result.sharpe_ratio, 0.0);
    assert_eq!(result.max_drawdown_percentage, 0.0);
    assert_curve_lengths(&result, &bars);
}

#[test]
fn stop_loss_caps_the_loss() {
    let mut cfg = config();
    cfg.stop_loss = 5.0;
    cfg.slippage_percentage = 0.05;
    let bars = vec![
        flat(0, 100.0),
        flat(1, 100.0),
        flat(2, 100.0),
        bar(3, 99.0, 99.5, 97.0, 97.0),
        bar(4, 96.0, 96.0, 94.0, 94.0),
        flat(5, 94.0),
    ];
    let result = run_backtest(&cfg, &bars, &scripted(vec![(2, SignalAction::Buy)])).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_eq!(trade.exit_bar, 4);
    let bound = -(cfg.stop_loss + cfg.fee_percentage + cfg.slippage_percentage);
    assert!(
        trade.profit_percentage >= bound,
        "profit {}% below bound {bound}%",
        trade.profit_percentage
    );
    assert!(result.max_drawdown_percentage > 4.9);
    assert!(result.drawdown_curve.iter().all(|&d| d >= 0.0));
    assert_capital_identity(&result);
}

#[test]
fn stop_loss_with_fees_stays_within_stop_plus_costs() {
    let bound_holds = |cfg: &BacktestConfig, bars: &[PriceBar], action: SignalAction| {
        let result = run_backtest(cfg, bars, &scripted(vec![(1, action)])).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_bar, 2);
        assert!(trade.fees > 0.0);
        let bound = -(cfg.stop_loss + cfg.fee_percentage + cfg.slippage_percentage);
        assert!(
            trade.profit_percentage >= bound - 1e-9,
            "{:?} profit {}% below bound {bound}%",
            trade.direction,
            trade.profit_percentage
        );
        assert_capital_identity(&result);
    };

    let mut cfg = config();
    cfg.stop_loss = 5.0;
    cfg.fee_percentage = 0.1;
    let drop = vec![flat(0, 100.0), flat(1, 100.0), bar(2, 100.0, 100.0, 94.0, 94.0)];
    bound_holds(&cfg, &drop, SignalAction::Buy);

    cfg.slippage_percentage = 0.05;
    let gap = vec![flat(0, 100.0), flat(1, 100.0), bar(2, 99.0, 99.0, 90.0, 92.0)];
    bound_holds(&cfg, &gap, SignalAction::Buy);

    cfg.trading_mode = TradingMode::LongShort;
    let spike = vec![flat(0, 100.0), flat(1, 100.0), bar(2, 101.0, 108.0, 101.0, 107.0)];
    bound_holds(&cfg, &spike, SignalAction::Sell);
}

#[test]
fn single_slot_trades_never_overlap() {
    let mut cfg = config();
    cfg.max_positions = 1;
    cfg.stop_loss = 2.0;
    cfg.take_profit = 2.0;
    cfg.fee_percentage = 0.1;
    let bars = wave_bars(120);
    let result = run_backtest(&cfg, &bars, &always(SignalAction::Buy)).unwrap();

    assert!(result.trades.len() > 3, "expected several round trips");
    assert_eq!(result.peak_open_positions, 1);
    for pair in result.trades.windows(2) {
        assert!(pair[1].entry_bar >= pair[0].exit_bar);
        assert!(pair[1].position_id > pair[0].position_id);
    }
    assert_capital_identity(&result);
    assert_curve_lengths(&result, &bars);
}

#[test]
fn open_positions_never_exceed_max() {
    let mut cfg = config();
    cfg.max_positions = 3;
    cfg.max_position_size = 30.0;
    cfg.stop_loss = 50.0;
    cfg.take_profit = 100.0;
    let bars: Vec<_> = (0..10).map(|i| flat(i, 100.0)).collect();
    let result = run_backtest(&cfg, &bars, &always(SignalAction::Buy)).unwrap();

    assert_eq!(result.peak_open_positions, 3);
    assert_eq!(result.trades.len(), 3);
    for b in 0..bars.len() {
        let open = result
            .trades
            .iter()
            .filter(|t| t.entry_bar <= b && b < t.exit_bar)
            .count();
        assert!(open <= 3);
    }
}

#[test]
fn trailing_stop_ratchets_then_exits() {
    let mut cfg = config();
    cfg.enable_trailing_stop_loss = true;
    cfg.trailing_stop_loss_distance = 5.0;
    cfg.take_profit = 100.0;
    let bars = vec![
        flat(0, 100.0),
        flat(1, 100.0),
        bar(2, 100.0, 110.0, 100.0, 110.0),
        bar(3, 110.0, 120.0, 110.0, 120.0),
        bar(4, 120.0, 120.0, 116.0, 117.0),
        bar(5, 117.0, 117.0, 112.0, 113.0),
        flat(6, 113.0),
    ];
    let result = run_backtest(&cfg, &bars, &scripted(vec![(1, SignalAction::Buy)])).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::TrailingStop);
    assert_eq!(trade.exit_bar, 5);
    assert!(approx(trade.exit_price, 114.0));
    assert!(approx(result.final_capital, 11_400.0));
}

#[test]
fn take_profit_exits_at_target() {
    let bars = vec![
        flat(0, 100.0),
        flat(1, 100.0),
        bar(2, 100.0, 111.0, 99.0, 108.0),
        flat(3, 108.0),
    ];
    let result = run_backtest(&config(), &bars, &scripted(vec![(1, SignalAction::Buy)])).unwrap();

    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert!(approx(trade.exit_price, 110.0));
    assert!(approx(trade.profit, 1_000.0));
    assert_eq!(result.win_rate, 100.0);
}

#[test]
fn secure_initial_withdraws_entry_capital_once() {
    let mut cfg = config();
    cfg.secure_initial = true;
    cfg.secure_initial_threshold = 50.0;
    cfg.take_profit = 100.0;
    let bars = vec![
        flat(0, 100.0),
        flat(1, 100.0),
        bar(2, 150.0, 160.0, 150.0, 160.0),
        bar(3, 160.0, 172.0, 158.0, 170.0),
    ];
    let strategy = scripted(vec![
        (1, SignalAction::Buy),
        (2, SignalAction::Sell),
        (3, SignalAction::Sell),
    ]);
    let result = run_backtest(&cfg, &bars, &strategy).unwrap();

    assert_eq!(result.trades.len(), 2);
    let partial = &result.trades[0];
    assert_eq!(partial.exit_reason, ExitReason::SecureInitial);
    assert_eq!(partial.status, TradeStatus::Open);
    assert_eq!(partial.exit_bar, 2);
    assert!(approx(partial.quantity * partial.exit_price, 10_000.0));
    assert!(approx(partial.profit, 3_750.0));
    // Equity after the partial exit: the returned capital plus 37.5 units at 160.
    assert!(approx(result.equity_curve[2], 10_000.0 + 37.5 * 160.0));

    let rest = &result.trades[1];
    assert_eq!(rest.exit_reason, ExitReason::Signal);
    assert_eq!(rest.exit_bar, 3);
    assert!(approx(rest.quantity, 37.5));
    assert!(approx(result.final_capital, 16_375.0));
    assert_eq!(result.statistics.exits(ExitReason::SecureInitial), 1);
    assert_eq!(result.statistics.trade_count, 1);
    assert_eq!(result.statistics.partial_exits, 1);
    assert_eq!(result.trade_count(), 1);
    assert_eq!(result.win_rate, 100.0);
    assert_capital_identity(&result);
}

#[test]
fn secured_slice_does_not_count_toward_win_rate() {
    let mut cfg = config();
    cfg.secure_initial = true;
    cfg.secure_initial_threshold = 50.0;
    cfg.take_profit = 100.0;
    let bars = vec![
        flat(0, 100.0),
        flat(1, 100.0),
        bar(2, 150.0, 160.0, 150.0, 160.0),
        bar(3, 160.0, 160.0, 90.0, 92.0),
    ];
    let strategy = scripted(vec![(1, SignalAction::Buy)]);
    let result = run_backtest(&cfg, &bars, &strategy).unwrap();

    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].status, TradeStatus::Open);
    assert!(result.trades[0].profit > 0.0);
    let rest = &result.trades[1];
    assert_eq!(rest.exit_reason, ExitReason::StopLoss);
    assert_eq!(rest.status, TradeStatus::Closed);
    assert!(approx(rest.exit_price, 95.0));
    assert!(approx(rest.profit, -187.5));

    // One position, closed at a loss.
    assert_eq!(result.win_rate, 0.0);
    assert_eq!(result.trade_count(), 1);
    assert_eq!(result.statistics.trade_count, 1);
    assert_eq!(result.statistics.winning_trades, 0);
    assert_eq!(result.statistics.losing_trades, 1);
    assert_eq!(result.statistics.partial_exits, 1);
    assert!(approx(result.statistics.gross_profit, 3_750.0));
    assert!(approx(result.final_capital, 13_562.5));
    assert_capital_identity(&result);
}

#[test]
fn signal_exit_closes_long_at_close() {
    let bars = vec![
        flat(0, 100.0),
        flat(1, 100.0),
        bar(2, 100.0, 104.0, 99.0, 103.0),
        flat(3, 103.0),
    ];
    let strategy = scripted(vec![(1, SignalAction::Buy), (2, SignalAction::Sell)]);
    let result = run_backtest(&config(), &bars, &strategy).unwrap();

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::Signal);
    assert!(approx(result.trades[0].exit_price, 103.0));
    assert!(approx(result.final_capital, 10_300.0));
}

#[test]
fn short_take_profit_and_accounting() {
    let mut cfg = config();
    cfg.trading_mode = TradingMode::LongShort;
    let bars = vec![
        flat(0, 100.0),
        flat(1, 100.0),
        bar(2, 100.0, 100.0, 89.0, 91.0),
        flat(3, 91.0),
    ];
    let result = run_backtest(&cfg, &bars, &scripted(vec![(1, SignalAction::Sell)])).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.direction, Direction::Short);
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert!(approx(trade.exit_price, 90.0));
    assert!(approx(result.final_capital, 11_000.0));
    assert_capital_identity(&result);
}

#[test]
fn sell_is_ignored_when_long_only_and_flat() {
    let bars: Vec<_> = (0..5).map(|i| flat(i, 100.0)).collect();
    let result = run_backtest(&config(), &bars, &always(SignalAction::Sell)).unwrap();
    assert!(result.trades.is_empty());
    assert_eq!(result.win_rate, 0.0);
    assert_eq!(result.final_capital, 10_000.0);
}

#[test]
fn strategy_error_aborts_with_context() {
    let bars: Vec<_> = (0..10).map(|i| flat(i, 100.0)).collect();
    let flaky = FnStrategy::new("flaky", |_: &[PriceBar], i: usize| {
        if i == 3 {
            Err(StrategyError::Evaluation("division by zero".into()))
        } else {
            Ok(Signal::buy(1.0))
        }
    });
    match run_backtest(&config(), &bars, &flaky) {
        Err(BacktestError::Strategy {
            strategy,
            index,
            source,
        }) => {
            assert_eq!(strategy, "flaky");
            assert_eq!(index, 3);
            assert!(matches!(source, StrategyError::Evaluation(_)));
        }
        other => panic!("expected strategy error, got {other:?}"),
    }
}

#[test]
fn strategy_never_sees_future_bars() {
    let bars = wave_bars(40);
    let peeking = FnStrategy::new("peek_check", |prefix: &[PriceBar], i: usize| {
        if prefix.len() != i + 1 {
            return Err(StrategyError::Evaluation("saw future bars".into()));
        }
        Ok(Signal::hold())
    });
    assert!(run_backtest(&config(), &bars, &peeking).is_ok());
}

#[test]
fn config_and_data_errors_fail_fast() {
    let bars: Vec<_> = (0..5).map(|i| flat(i, 100.0)).collect();

    let mut bad = config();
    bad.max_positions = 0;
    assert!(matches!(
        run_backtest(&bad, &bars, &always(SignalAction::Buy)),
        Err(BacktestError::Config(_))
    ));

    let mut unordered = bars.clone();
    unordered.swap(1, 2);
    assert!(matches!(
        run_backtest(&config(), &unordered, &always(SignalAction::Buy)),
        Err(BacktestError::Data(DataError::NonChronological { index: 2 }))
    ));
}

#[test]
fn identical_inputs_give_identical_results() {
    let bars = synthetic_bars(250);
    let mut cfg = config();
    cfg.fee_percentage = 0.1;
    cfg.slippage_percentage = 0.05;
    cfg.enable_trailing_stop_loss = true;
    cfg.trading_mode = TradingMode::LongShort;
    cfg.max_positions = 2;
    cfg.max_position_size = 50.0;
    let params: StrategyParams =
        serde_json::from_str(r#"{"kind":"ma_crossover","fast_period":5,"slow_period":20}"#).unwrap();

    let a = run_backtest(&cfg, &bars, &params.build().unwrap()).unwrap();
    let b = run_backtest(&cfg, &bars, &params.build().unwrap()).unwrap();
    assert_eq!(a, b);
    assert_capital_identity(&a);
    assert_curve_lengths(&a, &bars);
    assert!((0.0..=100.0).contains(&a.win_rate));
}

#[test]
fn streamed_sessions_match_prefix_evaluation() {
    let bars = synthetic_bars(500);
    let mut cfg = config();
    cfg.fee_percentage = 0.1;
    cfg.trading_mode = TradingMode::LongShort;
    let kinds = [
        r#"{"kind":"ma_crossover","fast_period":8,"slow_period":21,"ma_type":"ema"}"#,
        r#"{"kind":"ma_crossover","fast_period":8,"slow_period":21,"ma_type":"sma"}"#,
        r#"{"kind":"rsi_reversion","period":10}"#,
    ];
    for json in kinds {
        let params: StrategyParams = serde_json::from_str(json).unwrap();
        let strategy = params.build().unwrap();
        // Same strategy with the default session: full prefix at every bar.
        let from_prefix = FnStrategy::new("prefix", |b: &[PriceBar], i: usize| {
            strategy.evaluate(b, i)
        });
        let streamed = run_backtest(&cfg, &bars, &strategy).unwrap();
        let recomputed = run_backtest(&cfg, &bars, &from_prefix).unwrap();
        assert!(!streamed.trades.is_empty(), "{json}");
        assert_eq!(streamed, recomputed, "{json}");
    }
}

#[test]
fn builtin_strategies_hold_invariants_on_synthetic_data() {
    let bars = synthetic_bars(400);
    let kinds = [
        r#"{"kind":"ma_crossover","fast_period":10,"slow_period":30,"ma_type":"sma"}"#,
        r#"{"kind":"rsi_reversion"}"#,
        r#"{"kind":"breakout","lookback":20}"#,
        r#"{"kind":"bollinger_reversion"}"#,
        r#"{"kind":"buy_and_hold"}"#,
    ];
    let mut cfg = config();
    cfg.fee_percentage = 0.1;
    cfg.slippage_percentage = 0.05;
    cfg.secure_initial = true;
    cfg.secure_initial_threshold = 8.0;
    cfg.risk_per_trade = 2.0;
    for json in kinds {
        let params: StrategyParams = serde_json::from_str(json).unwrap();
        let result = run_backtest(&cfg, &bars, &params.build().unwrap()).unwrap();
        assert_capital_identity(&result);
        assert_curve_lengths(&result, &bars);
        assert!(result.peak_open_positions <= cfg.max_positions);
        assert!((0.0..=100.0).contains(&result.win_rate), "{json}");
        for trade in &result.trades {
            assert!(trade.quantity > 0.0);
            assert!(trade.exit_time >= trade.entry_time);
        }
    }
}
