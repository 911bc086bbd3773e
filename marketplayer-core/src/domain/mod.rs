//! Domain types for the simulator

pub mod account;
pub mod ids;
pub mod instrument;
pub mod money;
pub mod order;
pub mod position;
pub mod quote;

pub use account::{Account, EquitySnapshot};
pub use ids::{IdGen, Ticket};
pub use instrument::{Instrument, InstrumentError, InstrumentSpec, SeriesMode, SpreadModel};
pub use order::{is_triggered, Direction, OrderKind, OrderRequest, PendingOrder};
pub use position::{CloseReason, ClosedPosition, Position};
pub use quote::{PriceField, Quote, QuoteSupplier};
