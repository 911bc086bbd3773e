//! Simulation & risk engine: execution, margin, lifecycle, clock, and the
//! per-tick pipeline that ties them to one account.

pub mod advisor;
pub mod clock;
pub mod error;
pub mod execution;
pub mod lifecycle;
pub mod liquidation;
pub mod margin;
pub mod scheduler;
pub mod simulator;

pub use advisor::{ExpertAdvisor, RunStats};
pub use clock::MarketClock;
pub use error::{EngineError, InvariantViolation, Rejection, ValidationError};
pub use execution::send_order;
pub use lifecycle::{change_position, close_position, refresh};
pub use liquidation::{CloseWorstFirst, LiquidationPolicy, NoLiquidation};
pub use margin::{CurrencyConverter, NoCrossRates, RateTable};
pub use scheduler::{cancel_order, execute_scheduled_orders, schedule_order};
pub use simulator::{verify_account, Simulator, TickEvents};
