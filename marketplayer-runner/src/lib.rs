//! MarketPlayer Runner: configuration, data loading, and orchestration.
//!
//! This crate builds on `marketplayer-core` to provide:
//! - TOML run configuration with validation
//! - CSV quote loading behind the core's `QuoteSupplier` seam
//! - A moving-average crossover expert advisor
//! - Single-run driver producing a `RunReport` with metrics
//! - JSON/CSV report export
//! - Parallel parameter sweeps over shared quote series

pub mod advisor;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use advisor::MaCrossAdvisor;
pub use config::{ConfigError, LiquidationMode, SimulationConfig, SizingMode};
pub use data_loader::{read_quotes, CsvQuoteSupplier, LoadError};
pub use export::save_artifacts;
pub use metrics::RunMetrics;
pub use runner::{run_simulation, run_with_data, MarketData, RunError, RunReport};
pub use sweep::{run_sweep, ParamGrid, ParamSweep, SweepResults};
