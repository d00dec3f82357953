//! tradesim CLI: run, sweep and check commands.
//!
//! Commands:
//! - `run`: load the run file's data and backtest its strategy
//! - `sweep`: backtest every point of the run file's `[sweep.grid]`
//! - `check`: validate a run file without loading any data

mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;

use tradesim_runner::{
    run_spec_cancellable, sweep_spec, RunReport, RunSpec, RunSummary, SweepReport, SweepTable,
    TradeTable,
};

use logging::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "tradesim", version, about = "tradesim: bar-by-bar trade backtesting")]
struct Cli {
    /// Log level filter (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest the run file's strategy.
    Run {
        /// Path to a TOML run file.
        #[arg(long)]
        config: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Trade rows to print in table output.
        #[arg(long, default_value_t = 20)]
        trades: usize,
    },
    /// Backtest every point of the run file's parameter grid.
    Sweep {
        /// Path to a TOML run file.
        #[arg(long)]
        config: PathBuf,

        /// Ranked rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Validate a run file without loading data.
    Check {
        /// Path to a TOML run file.
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Run {
            config,
            format,
            trades,
        } => run_cmd(&config, format, trades).await,
        Commands::Sweep {
            config,
            top,
            format,
        } => sweep_cmd(&config, top, format).await,
        Commands::Check { config } => check_cmd(&config),
    }
}

fn load_spec(path: &Path) -> Result<RunSpec> {
    RunSpec::from_file(path).with_context(|| format!("invalid run file {}", path.display()))
}

async fn run_cmd(path: &Path, format: OutputFormat, trades: usize) -> Result<()> {
    let spec = load_spec(path)?;
    if spec.sweep.is_some() {
        tracing::warn!("run ignores [sweep]; use the sweep command to run the grid");
    }

    let provider = spec.data.build_provider()?;
    let ctx = spec.data.load_context();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling data load");
            let _ = cancel_tx.send(true);
        }
    });

    let report = run_spec_cancellable(&spec, provider.as_ref(), &ctx, cancel_rx)
        .await
        .context("backtest failed")?;
    print_run(&report, format, trades)
}

async fn sweep_cmd(path: &Path, top: usize, format: OutputFormat) -> Result<()> {
    let spec = load_spec(path)?;
    let provider = spec.data.build_provider()?;
    let ctx = spec.data.load_context();

    let report = sweep_spec(&spec, provider.as_ref(), &ctx)
        .await
        .context("sweep failed")?;
    print_sweep(&report, top, format)
}

fn check_cmd(path: &Path) -> Result<()> {
    let spec = load_spec(path)?;
    spec.validate()
        .with_context(|| format!("run file {} failed validation", path.display()))?;

    let points = spec.strategies()?.len();
    println!("{}: ok", path.display());
    println!(
        "  data:     {} {} {} to {} ({:?})",
        spec.data.symbol,
        spec.backtest.timeframe,
        spec.backtest.start_date,
        spec.backtest.end_date,
        spec.data.provider
    );
    println!("  strategy: {}", spec.strategy);
    if spec.sweep.is_some() {
        println!("  sweep:    {points} valid grid points");
    }
    Ok(())
}

fn print_run(report: &RunReport, format: OutputFormat, trades: usize) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            println!("{}", RunSummary(report));
            if !report.result.trades.is_empty() && trades > 0 {
                print!(
                    "{}",
                    TradeTable {
                        trades: &report.result.trades,
                        limit: trades,
                    }
                );
            }
        }
    }
    Ok(())
}

fn print_sweep(report: &SweepReport, top: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report.top(top))?)
        }
        OutputFormat::Table => print!("{}", SweepTable { report, top }),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from([
            "tradesim",
            "sweep",
            "--config",
            "run.toml",
            "--top",
            "3",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Sweep { top, format, .. } => {
                assert_eq!(top, 3);
                assert_eq!(format, OutputFormat::Table);
            }
            _ => panic!("expected sweep"),
        }
    }
}
