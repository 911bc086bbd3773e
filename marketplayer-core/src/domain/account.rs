//! Account: the position ledger: cash aggregates plus order/position books.
//!
//! Accounting identities maintained by the engine at every tick:
//! - `equity == balance + sum(position.profit)`
//! - `margin == sum(position.margin)`
//! - `free_margin == equity - margin`, non-negative after every accepted order

use super::ids::{IdGen, Ticket};
use super::order::PendingOrder;
use super::position::{ClosedPosition, Position};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Account state at one tick, recorded after each clock advance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub timestamp: NaiveDateTime,
    pub balance: f64,
    pub equity: f64,
    pub margin: f64,
}

impl EquitySnapshot {
    pub fn free_margin(&self) -> f64 {
        self.equity - self.margin
    }
}

/// Trading account.
#[derive(Debug, Clone)]
pub struct Account {
    pub(crate) base_currency: String,
    pub(crate) leverage: f64,
    pub(crate) balance: f64,
    pub(crate) equity: f64,
    pub(crate) margin: f64,
    pub(crate) orders: Vec<PendingOrder>,
    pub(crate) positions: Vec<Position>,
    pub(crate) closed_positions: Vec<ClosedPosition>,
    pub(crate) margin_call: bool,
    pub(crate) equity_history: Vec<EquitySnapshot>,
    pub(crate) tickets: IdGen,
}

impl Account {
    /// Fresh account: equity equals the starting balance, no margin in use.
    pub fn new(balance: f64, leverage: f64, base_currency: impl Into<String>) -> Self {
        Self::with_state(balance, balance, 0.0, leverage, base_currency)
    }

    /// Account with explicit balance/equity/margin, as reported by a broker.
    pub fn with_state(
        balance: f64,
        equity: f64,
        margin: f64,
        leverage: f64,
        base_currency: impl Into<String>,
    ) -> Self {
        Self {
            base_currency: base_currency.into(),
            leverage,
            balance,
            equity,
            margin,
            orders: Vec::new(),
            positions: Vec::new(),
            closed_positions: Vec::new(),
            margin_call: false,
            equity_history: Vec::new(),
            tickets: IdGen::default(),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn free_margin(&self) -> f64 {
        self.equity - self.margin
    }

    /// Sum of floating P&L over open positions.
    pub fn floating_profit(&self) -> f64 {
        self.positions.iter().map(|p| p.profit).sum()
    }

    /// Whether the margin-call monitor flagged the account on the last tick.
    pub fn is_margin_call(&self) -> bool {
        self.margin_call
    }

    /// Scheduled orders not yet filled.
    pub fn orders(&self) -> &[PendingOrder] {
        &self.orders
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn closed_positions(&self) -> &[ClosedPosition] {
        &self.closed_positions
    }

    pub fn equity_history(&self) -> &[EquitySnapshot] {
        &self.equity_history
    }

    pub fn position(&self, ticket: Ticket) -> Option<&Position> {
        self.positions.iter().find(|p| p.ticket == ticket)
    }

    pub(crate) fn position_index(&self, ticket: Ticket) -> Option<usize> {
        self.positions.iter().position(|p| p.ticket == ticket)
    }

    /// Open positions on one instrument.
    pub fn positions_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a Position> + 'a {
        self.positions.iter().filter(move |p| p.symbol == symbol)
    }

    /// Closed positions on one instrument, oldest first.
    pub fn closed_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a ClosedPosition> + 'a {
        self.closed_positions.iter().filter(move |c| c.position.symbol == symbol)
    }

    pub(crate) fn record_snapshot(&mut self, timestamp: NaiveDateTime) {
        self.equity_history.push(EquitySnapshot {
            timestamp,
            balance: self.balance,
            equity: self.equity,
            margin: self.margin,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::Direction;
    use chrono::NaiveDate;

    fn position(ticket: u64, symbol: &str, margin: f64, profit: f64) -> Position {
        Position {
            ticket: Ticket(ticket),
            symbol: symbol.into(),
            direction: Direction::Buy,
            lots: 0.1,
            open_price: 1.2,
            open_time: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            stop_loss: 0.0,
            take_profit: 0.0,
            margin,
            profit,
        }
    }

    #[test]
    fn new_account_is_flat() {
        let account = Account::new(15_000.0, 100.0, "USD");
        assert_eq!(account.balance(), 15_000.0);
        assert_eq!(account.equity(), 15_000.0);
        assert_eq!(account.margin(), 0.0);
        assert_eq!(account.free_margin(), 15_000.0);
        assert!(account.positions().is_empty());
        assert!(!account.is_margin_call());
    }

    #[test]
    fn with_state_keeps_broker_values() {
        let account = Account::with_state(15_000.0, 10.0, 0.0, 100.0, "USD");
        assert_eq!(account.equity(), 10.0);
        assert_eq!(account.free_margin(), 10.0);
    }

    #[test]
    fn lookups_by_ticket_and_symbol() {
        let mut account = Account::new(10_000.0, 100.0, "USD");
        account.positions.push(position(1, "EURUSD", 12.0, 5.0));
        account.positions.push(position(2, "GBPUSD", 15.0, -2.0));
        assert_eq!(account.position(Ticket(2)).map(|p| p.symbol.as_str()), Some("GBPUSD"));
        assert_eq!(account.position_index(Ticket(3)), None);
        assert_eq!(account.positions_for("EURUSD").count(), 1);
        assert!((account.floating_profit() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn snapshot_records_aggregates() {
        let mut account = Account::with_state(1_000.0, 1_010.0, 40.0, 100.0, "USD");
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        account.record_snapshot(ts);
        let snap = account.equity_history()[0];
        assert_eq!(snap.free_margin(), 970.0);
        assert_eq!(snap.timestamp, ts);
    }
}
