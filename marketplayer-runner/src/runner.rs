//! Simulation runner: wires config, quote data, the advisor, and metrics.
//!
//! Two entry points:
//! - `run_simulation()`: loads quotes from the configured CSV files, then runs. Used by the CLI.
//! - `run_with_data()`: takes pre-loaded `MarketData` and explicit periods. Used by the sweep,
//!   where every run shares the same quote series.

use marketplayer_core::domain::{
    Account, ClosedPosition, EquitySnapshot, Instrument, InstrumentError, QuoteSupplier,
};
use marketplayer_core::engine::{CloseWorstFirst, InvariantViolation, Simulator};
use marketplayer_core::sizers::SizingConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advisor::MaCrossAdvisor;
use crate::config::{validate_periods, ConfigError, LiquidationMode, SimulationConfig};
use crate::data_loader::{CsvQuoteSupplier, LoadError};
use crate::metrics::RunMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("instrument error: {0}")]
    Instrument(#[from] InstrumentError),
    #[error("simulation aborted: {0}")]
    Engine(#[from] InvariantViolation),
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub fast_period: usize,
    pub slow_period: usize,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub final_equity: f64,
    pub final_margin: f64,
    pub open_positions: usize,
    pub ticks: usize,
    pub entries: usize,
    /// Signals the advisor dropped because sizing gave no tradable volume.
    #[serde(default)]
    pub skipped_entries: usize,
    pub rejections: usize,
    pub margin_call_ticks: usize,
    pub truncated: bool,
    pub metrics: RunMetrics,
    pub equity_curve: Vec<EquitySnapshot>,
    pub closed_positions: Vec<ClosedPosition>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Instruments built from quote files, ready to be cloned into runs.
///
/// Cloning an `Instrument` shares its series, so every run gets its own
/// cursor over the same data.
#[derive(Debug, Clone)]
pub struct MarketData {
    instruments: Vec<Instrument>,
}

impl MarketData {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }

    /// Load every configured instrument through a `CsvQuoteSupplier`.
    pub fn load(config: &SimulationConfig) -> Result<Self, RunError> {
        let supplier = config
            .instruments
            .iter()
            .fold(CsvQuoteSupplier::new(), |s, i| s.with_file(i.symbol.clone(), i.quotes.clone()));
        let mut instruments = Vec::with_capacity(config.instruments.len());
        for inst in &config.instruments {
            let spec = inst.spec();
            let quotes = supplier.quotes(&spec.symbol, &spec.period)?;
            let instrument = Instrument::new(spec, quotes)?.with_spread(inst.spread());
            tracing::debug!(
                symbol = instrument.symbol(),
                ticks = instrument.len(),
                tick_data = instrument.is_tick(),
                "instrument loaded"
            );
            instruments.push(instrument);
        }
        Ok(Self { instruments })
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }
}

/// Fresh simulator over `market` with the config's account, rates, liquidation, and sizing.
pub fn build_simulator(config: &SimulationConfig, market: &MarketData) -> Result<Simulator, RunError> {
    let account = Account::new(
        config.account.balance,
        config.account.leverage,
        config.account.currency.clone(),
    );
    let mut sim = Simulator::new(account)
        .with_rates(config.rate_table())
        .with_sizing(SizingConfig { min_observations: config.run.min_observations });
    if config.run.liquidation == LiquidationMode::CloseWorstFirst {
        sim = sim.with_liquidation(CloseWorstFirst);
    }
    for inst in market.instruments() {
        sim.add_instrument(inst.clone())?;
    }
    Ok(sim)
}

/// Load quotes and run the configured advisor once.
pub fn run_simulation(config: &SimulationConfig) -> Result<RunReport, RunError> {
    let market = MarketData::load(config)?;
    run_with_data(
        config,
        &market,
        config.advisor.fast_period,
        config.advisor.slow_period,
    )
}

/// Run the advisor with explicit periods over pre-loaded data without I/O.
pub fn run_with_data(
    config: &SimulationConfig,
    market: &MarketData,
    fast_period: usize,
    slow_period: usize,
) -> Result<RunReport, RunError> {
    validate_periods(fast_period, slow_period)?;
    let symbol = config.advisor_symbol().to_string();
    let mut sim = build_simulator(config, market)?;
    let mut advisor =
        MaCrossAdvisor::from_config(symbol.clone(), &config.advisor).with_periods(fast_period, slow_period);

    let stats = sim.run(&mut advisor, config.run.max_ticks)?;
    let account = sim.account();

    let report = RunReport {
        schema_version: SCHEMA_VERSION,
        symbol,
        fast_period,
        slow_period,
        initial_balance: config.account.balance,
        final_balance: account.balance(),
        final_equity: account.equity(),
        final_margin: account.margin(),
        open_positions: account.positions().len(),
        ticks: stats.ticks,
        entries: advisor.entries(),
        skipped_entries: advisor.skipped(),
        rejections: stats.rejections,
        margin_call_ticks: stats.margin_call_ticks,
        truncated: stats.truncated,
        metrics: RunMetrics::compute(
            config.account.balance,
            account.equity_history(),
            account.closed_positions(),
        ),
        equity_curve: account.equity_history().to_vec(),
        closed_positions: account.closed_positions().to_vec(),
    };
    tracing::info!(
        symbol = %report.symbol,
        fast = fast_period,
        slow = slow_period,
        trades = report.metrics.trade_count,
        equity = report.final_equity,
        "simulation complete"
    );
    Ok(report)
}
