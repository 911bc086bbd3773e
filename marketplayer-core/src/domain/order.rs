//! Order intents: direction, order kinds, and the validated request structure.

use super::ids::Ticket;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Default slippage tolerance, in pips.
pub const DEFAULT_SLIPPAGE_PIPS: u32 = 3;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

/// Instant or scheduled order kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fill now at the live price.
    Market(Direction),
    /// Buy when the ask falls to the trigger price.
    BuyLimit,
    /// Sell when the bid rises to the trigger price.
    SellLimit,
    /// Buy when the ask rises to the trigger price.
    BuyStop,
    /// Sell when the bid falls to the trigger price.
    SellStop,
}

impl OrderKind {
    pub fn direction(self) -> Direction {
        match self {
            OrderKind::Market(direction) => direction,
            OrderKind::BuyLimit | OrderKind::BuyStop => Direction::Buy,
            OrderKind::SellLimit | OrderKind::SellStop => Direction::Sell,
        }
    }

    pub fn is_pending(self) -> bool {
        !matches!(self, OrderKind::Market(_))
    }
}

/// Execution intent for one instrument.
///
/// Replaces a free-form option bag with explicit fields:
/// - `price`: requested price; `None` (or 0) means "at market"
/// - `slippage_pips`: max deviation between requested and live price (default 3)
/// - `stop_loss` / `take_profit`: absolute levels, 0 disables
///
/// Validation happens in the execution engine, not at construction, so a
/// malformed request is reported as a rejection rather than a panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub direction: Direction,
    pub lots: f64,
    pub price: Option<f64>,
    pub slippage_pips: u32,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl OrderRequest {
    pub fn new(direction: Direction, lots: f64) -> Self {
        Self {
            direction,
            lots,
            price: None,
            slippage_pips: DEFAULT_SLIPPAGE_PIPS,
            stop_loss: 0.0,
            take_profit: 0.0,
        }
    }

    pub fn buy(lots: f64) -> Self {
        Self::new(Direction::Buy, lots)
    }

    pub fn sell(lots: f64) -> Self {
        Self::new(Direction::Sell, lots)
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_slippage(mut self, pips: u32) -> Self {
        self.slippage_pips = pips;
        self
    }

    pub fn with_stop_loss(mut self, level: f64) -> Self {
        self.stop_loss = level;
        self
    }

    pub fn with_take_profit(mut self, level: f64) -> Self {
        self.take_profit = level;
        self
    }

    /// Requested price if one was set (a zero price counts as unset).
    pub fn requested_price(&self) -> Option<f64> {
        self.price.filter(|p| *p != 0.0)
    }
}

/// A scheduled order waiting for its trigger price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub ticket: Ticket,
    pub symbol: String,
    pub kind: OrderKind,
    /// Trigger price; the request's stop-loss/take-profit were validated against it.
    pub trigger_price: f64,
    pub request: OrderRequest,
    pub placed_at: NaiveDateTime,
}

impl PendingOrder {
    /// Pure trigger test against the live quote.
    pub fn is_triggered(&self, bid: f64, ask: f64) -> bool {
        is_triggered(self.kind, self.trigger_price, bid, ask)
    }
}

/// Whether an order of `kind` with `trigger_price` fires at the given bid/ask.
pub fn is_triggered(kind: OrderKind, trigger_price: f64, bid: f64, ask: f64) -> bool {
    match kind {
        OrderKind::Market(_) => true,
        OrderKind::BuyLimit => ask <= trigger_price,
        OrderKind::SellLimit => bid >= trigger_price,
        OrderKind::BuyStop => ask >= trigger_price,
        OrderKind::SellStop => bid <= trigger_price,
    }
}
