//! Forced-liquidation hook, consulted at tick boundaries while the account is
//! in margin call.

use crate::domain::{Account, Ticket};

/// Decides which position, if any, to close next while the account is in
/// margin call. Called repeatedly until it returns `None` or the call clears.
pub trait LiquidationPolicy: Send + Sync {
    fn next_to_close(&self, account: &Account) -> Option<Ticket>;

    fn name(&self) -> &str;
}

/// Flag margin calls but never close anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLiquidation;

impl LiquidationPolicy for NoLiquidation {
    fn next_to_close(&self, _account: &Account) -> Option<Ticket> {
        None
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Close the position with the worst floating P&L first (lowest ticket on ties).
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseWorstFirst;

impl LiquidationPolicy for CloseWorstFirst {
    fn next_to_close(&self, account: &Account) -> Option<Ticket> {
        account
            .positions()
            .iter()
            .min_by(|a, b| a.profit.total_cmp(&b.profit).then(a.ticket.cmp(&b.ticket)))
            .map(|p| p.ticket)
    }

    fn name(&self) -> &str {
        "close_worst_first"
    }
}
