use serde::{Deserialize, Serialize};
use std::fmt;

/// Broker ticket identifying a position or a pending order within one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for Ticket {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Monotonic ticket generator. Tickets start at 1; only a rolled-back fill
/// hands its ticket back.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    last: u64,
}

impl IdGen {
    pub fn next_ticket(&mut self) -> Ticket {
        self.last += 1;
        Ticket(self.last)
    }

    /// Give back the most recently issued ticket (rollback of a rejected fill).
    pub(crate) fn rewind(&mut self, ticket: Ticket) {
        if ticket.0 == self.last && self.last > 0 {
            self.last -= 1;
        }
    }
}
