//! Plain-text renderings of run and sweep reports.

use std::fmt;

use tradesim_core::Trade;

use crate::runner::RunReport;
use crate::sweep::SweepReport;

/// Summary block for one run.
pub struct RunSummary<'a>(pub &'a RunReport);

impl fmt::Display for RunSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let result = &report.result;
        let stats = &result.statistics;

        writeln!(f, "=== Backtest Result ===")?;
        writeln!(f, "Run:            {}", &report.run_id[..16.min(report.run_id.len())])?;
        writeln!(f, "Strategy:       {} ({})", result.strategy_name, report.strategy)?;
        writeln!(f, "Symbol:         {} via {}", report.symbol, report.provider)?;
        writeln!(
            f,
            "Period:         {} to {} ({})",
            report.config.start_date, report.config.end_date, report.config.timeframe
        )?;
        writeln!(f, "Bars:           {}", report.bar_count)?;
        writeln!(
            f,
            "Trades:         {} ({} partial exits)",
            result.trade_count(),
            stats.partial_exits
        )?;
        writeln!(f)?;
        writeln!(f, "--- Performance ---")?;
        writeln!(f, "Initial:        {:.2}", result.initial_capital)?;
        writeln!(f, "Final:          {:.2}", result.final_capital)?;
        writeln!(f, "Total Return:   {:.2}%", result.total_return_percentage)?;
        writeln!(f, "Sharpe:         {:.3}", result.sharpe_ratio)?;
        writeln!(f, "Sortino:        {:.3}", stats.sortino_ratio)?;
        writeln!(
            f,
            "Max Drawdown:   {:.2}% ({:.2})",
            result.max_drawdown_percentage, result.max_drawdown
        )?;
        writeln!(f, "Win Rate:       {:.1}%", result.win_rate)?;
        writeln!(f, "Profit Factor:  {:.2}", stats.profit_factor)?;
        writeln!(f, "Fees:           {:.2}", stats.total_fees)?;
        writeln!(f, "Exposure:       {:.1}%", stats.exposure * 100.0)?;
        writeln!(f, "Max Consec Win: {}", stats.max_consecutive_wins)?;
        writeln!(f, "Max Consec Loss:{}", stats.max_consecutive_losses)?;
        if !stats.exits_by_reason.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Exits ---")?;
            for (reason, count) in &stats.exits_by_reason {
                writeln!(f, "{reason:<16}{count}")?;
            }
        }
        Ok(())
    }
}

/// Trade log table, at most `limit` rows.
pub struct TradeTable<'a> {
    pub trades: &'a [Trade],
    pub limit: usize,
}

impl fmt::Display for TradeTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>4} {:<6} {:<17} {:>10} {:<17} {:>10} {:>11} {:>8} {:<16}",
            "#", "Side", "Entry", "Price", "Exit", "Price", "Profit", "Pct", "Reason"
        )?;
        writeln!(f, "{}", "-".repeat(107))?;
        for (i, t) in self.trades.iter().take(self.limit).enumerate() {
            writeln!(
                f,
                "{:>4} {:<6} {:<17} {:>10.2} {:<17} {:>10.2} {:>11.2} {:>7.2}% {:<16}",
                i + 1,
                t.direction.as_str(),
                t.entry_time.format("%Y-%m-%d %H:%M"),
                t.entry_price,
                t.exit_time.format("%Y-%m-%d %H:%M"),
                t.exit_price,
                t.profit,
                t.profit_percentage,
                t.exit_reason.as_str(),
            )?;
        }
        if self.trades.len() > self.limit {
            writeln!(f, "... {} more", self.trades.len() - self.limit)?;
        }
        Ok(())
    }
}

/// Ranking table for a sweep, at most `top` rows.
pub struct SweepTable<'a> {
    pub report: &'a SweepReport,
    pub top: usize,
}

impl fmt::Display for SweepTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        writeln!(
            f,
            "Sweep: {} points on {} ({} bars), ranked by {}",
            report.len(),
            report.symbol,
            report.bar_count,
            report.rank_by.as_str()
        )?;
        writeln!(
            f,
            "{:>4} {:<44} {:>10} {:>8} {:>8} {:>7} {:>6}",
            "Rank", "Strategy", "Return%", "Sharpe", "MaxDD%", "Win%", "Trades"
        )?;
        writeln!(f, "{}", "-".repeat(93))?;
        for entry in report.top(self.top) {
            let r = &entry.result;
            writeln!(
                f,
                "{:>4} {:<44} {:>10.2} {:>8.3} {:>8.2} {:>7.1} {:>6}",
                entry.rank,
                entry.label,
                r.total_return_percentage,
                r.sharpe_ratio,
                r.max_drawdown_percentage,
                r.win_rate,
                r.trade_count(),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankMetric;
    use crate::data_loader::{compute_dataset_hash, LoadedData};
    use crate::runner::execute;
    use crate::sweep::SweepEntry;
    use tradesim_core::data::{DataRequest, DataSource, SyntheticProvider};
    use tradesim_core::{BacktestConfig, StrategyParams};

    fn report() -> RunReport {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let request = DataRequest::new("SYN", start, end, "1d").unwrap();
        let bars = SyntheticProvider::new(8).generate(&request);
        let loaded = LoadedData {
            dataset_hash: compute_dataset_hash(&bars),
            bars,
            source: DataSource::Synthetic,
            provider: "synthetic".into(),
        };
        let strategy: StrategyParams = toml::from_str("kind = \"buy_and_hold\"").unwrap();
        execute(&BacktestConfig::default(), &strategy, &loaded, "SYN").unwrap()
    }

    #[test]
    fn summary_lists_headline_numbers() {
        let report = report();
        let text = RunSummary(&report).to_string();
        assert!(text.contains("=== Backtest Result ==="));
        assert!(text.contains("Symbol:         SYN via synthetic"));
        assert!(text.contains(&format!("{:.2}", report.result.final_capital)));
        assert!(text.contains("Win Rate:"));
    }

    #[test]
    fn trade_table_truncates() {
        let report = report();
        let trades = vec![report.result.trades[0].clone(); 3];
        let text = TradeTable {
            trades: &trades,
            limit: 2,
        }
        .to_string();
        // header, rule, two rows, overflow note
        assert_eq!(text.lines().count(), 5);
        assert!(text.ends_with("... 1 more\n"));
    }

    #[test]
    fn sweep_table_shows_top_rows_only() {
        let run = report();
        let entry = SweepEntry {
            rank: 1,
            label: run.strategy.to_string(),
            strategy: run.strategy.clone(),
            score: run.result.sharpe_ratio,
            result: run.result.clone(),
        };
        let sweep = SweepReport {
            symbol: "SYN".into(),
            dataset_hash: run.dataset_hash.clone(),
            bar_count: run.bar_count,
            rank_by: RankMetric::SharpeRatio,
            entries: vec![entry.clone(), SweepEntry { rank: 2, ..entry }],
        };
        let text = SweepTable {
            report: &sweep,
            top: 1,
        }
        .to_string();
        assert!(text.starts_with("Sweep: 2 points on SYN"));
        assert_eq!(text.lines().count(), 4);
    }
}
