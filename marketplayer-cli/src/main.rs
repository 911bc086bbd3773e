//! MarketPlayer CLI: run and sweep commands.
//!
//! Commands:
//! - `run`: simulate the configured advisor once and print a summary
//! - `sweep`: run a fast × slow period grid in parallel and rank the results
//!
//! Logging goes to stderr; set `RUST_LOG` to override the default filter.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use marketplayer_runner::sweep::ParamSweep;
use marketplayer_runner::{
    export, run_with_data, save_artifacts, MarketData, ParamGrid, RunReport, SimulationConfig,
};

#[derive(Parser)]
#[command(
    name = "marketplayer",
    about = "MarketPlayer CLI: tick-by-tick trading account simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate the configured advisor over the configured quote files.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Write the full report as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write report.json, trades.csv, and equity.csv into this directory.
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
    /// Sweep fast/slow moving-average periods.
    Sweep {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Fast periods, comma separated (e.g. 5,10).
        #[arg(long, value_delimiter = ',', required = true)]
        fast: Vec<usize>,

        /// Slow periods, comma separated (e.g. 20,50).
        #[arg(long, value_delimiter = ',', required = true)]
        slow: Vec<usize>,

        /// Number of best runs to print.
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Run the grid on one thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Write every report as a JSON array to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output, artifacts } => run_cmd(config, output, artifacts),
        Commands::Sweep {
            config,
            fast,
            slow,
            top,
            sequential,
            output,
        } => sweep_cmd(config, fast, slow, top, sequential, output),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,marketplayer=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<SimulationConfig> {
    SimulationConfig::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn run_cmd(config_path: PathBuf, output: Option<PathBuf>, artifacts: Option<PathBuf>) -> Result<()> {
    let config = load_config(&config_path)?;
    let market = MarketData::load(&config)?;
    info!(instruments = market.instruments().len(), "quotes loaded");

    let report = run_with_data(
        &config,
        &market,
        config.advisor.fast_period,
        config.advisor.slow_period,
    )?;
    print_summary(&report);

    if let Some(path) = output {
        std::fs::write(&path, export::export_json(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }
    if let Some(dir) = artifacts {
        let dir = save_artifacts(&report, &dir)?;
        println!("Artifacts saved to: {}", dir.display());
    }
    Ok(())
}

fn sweep_cmd(
    config_path: PathBuf,
    fast: Vec<usize>,
    slow: Vec<usize>,
    top: usize,
    sequential: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let grid = ParamGrid::new(fast, slow);
    if grid.combinations().is_empty() {
        bail!("no valid (fast, slow) pair: every fast period must be positive and below a slow period");
    }

    let config = load_config(&config_path)?;
    let market = MarketData::load(&config)?;
    let results = ParamSweep::new(&config, &market)
        .with_parallelism(!sequential)
        .sweep(&grid)?;

    println!(
        "{:>6} {:>6} {:>10} {:>10} {:>8} {:>8} {:>12}",
        "fast", "slow", "return", "max_dd", "trades", "win%", "equity"
    );
    for r in results.top_n(top) {
        println!(
            "{:>6} {:>6} {:>9.2}% {:>9.2}% {:>8} {:>7.1}% {:>12.2}",
            r.fast_period,
            r.slow_period,
            r.metrics.total_return * 100.0,
            r.metrics.max_drawdown * 100.0,
            r.metrics.trade_count,
            r.metrics.win_rate * 100.0,
            r.final_equity
        );
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(results.all())?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Sweep results saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    let m = &report.metrics;
    println!("=== {} (fast {} / slow {}) ===", report.symbol, report.fast_period, report.slow_period);
    println!("Ticks:          {}{}", report.ticks, if report.truncated { " (truncated)" } else { "" });
    println!("Initial:        {:.2}", report.initial_balance);
    println!("Balance:        {:.2}", report.final_balance);
    println!("Equity:         {:.2}", report.final_equity);
    println!("Margin:         {:.2}", report.final_margin);
    println!("Open positions: {}", report.open_positions);
    println!("Total return:   {:.2}%", m.total_return * 100.0);
    println!("Max drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Trades:         {}", m.trade_count);
    println!("Win rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit factor:  {:.2}", m.profit_factor);
    println!("Skipped:        {}", report.skipped_entries);
    println!("Rejections:     {}", report.rejections);
    println!("Margin calls:   {} ticks", report.margin_call_ticks);
}
