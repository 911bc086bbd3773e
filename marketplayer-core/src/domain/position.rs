use super::ids::Ticket;
use super::order::Direction;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An open position (a filled order).
///
/// `margin` is the amount reserved for it at fill time; `profit` is its
/// floating P&L in account currency as of the last mark-to-market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: Direction,
    pub lots: f64,
    pub open_price: f64,
    pub open_time: NaiveDateTime,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub margin: f64,
    pub profit: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Buy
    }

    /// Price-space P&L in quote currency at `price`:
    /// `(price - open) * lots * sign * standard_lot`.
    pub fn gross_profit(&self, price: f64, standard_lot: f64) -> f64 {
        (price - self.open_price) * self.lots * self.direction.sign() * standard_lot
    }

    /// Whether the protective stop is crossed at the exit price.
    pub fn stop_loss_hit(&self, exit_price: f64) -> bool {
        if self.stop_loss == 0.0 {
            return false;
        }
        match self.direction {
            Direction::Buy => exit_price <= self.stop_loss,
            Direction::Sell => exit_price >= self.stop_loss,
        }
    }

    /// Whether the profit target is reached at the exit price.
    pub fn take_profit_hit(&self, exit_price: f64) -> bool {
        if self.take_profit == 0.0 {
            return false;
        }
        match self.direction {
            Direction::Buy => exit_price >= self.take_profit,
            Direction::Sell => exit_price <= self.take_profit,
        }
    }
}

/// Why a position left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Manual,
    StopLoss,
    TakeProfit,
    StopOut,
}

/// A closed position with its realized result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub position: Position,
    pub close_price: f64,
    pub close_time: NaiveDateTime,
    /// Realized P&L in account currency.
    pub profit: f64,
    pub reason: CloseReason,
}

impl ClosedPosition {
    pub fn ticket(&self) -> Ticket {
        self.position.ticket
    }

    /// Realized P&L per lot, the unit sizing statistics are computed in.
    pub fn profit_per_lot(&self) -> f64 {
        if self.position.lots > 0.0 {
            self.profit / self.position.lots
        } else {
            0.0
        }
    }
}
