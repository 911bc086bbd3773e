//! MarketPlayer Core: tick-by-tick trading account simulation.
//!
//! This crate contains the simulation and risk engine:
//! - Domain types (quotes, instruments, orders, positions, the account ledger)
//! - Order execution with slippage tolerance and atomic margin reservation
//! - Margin engine with currency conversion and margin-call monitoring
//! - Position lifecycle under freeze-band constraints
//! - Multi-instrument clock delivering ticks in global time order
//! - Position sizing (percent, Kelly, optimal f, secure f, fractional f)
//!
//! Nothing here performs I/O; quote data comes in through `QuoteSupplier`
//! implementations owned by the caller.

pub mod domain;
pub mod engine;
pub mod sizers;

pub use domain::{Account, Direction, Instrument, InstrumentSpec, OrderKind, OrderRequest, Quote, Ticket};
pub use engine::{EngineError, ExpertAdvisor, InvariantViolation, Rejection, Simulator};
