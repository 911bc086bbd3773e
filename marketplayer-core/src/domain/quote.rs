//! Quote: one OHLC tick of a historical series.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamped OHLC quote for a single instrument.
///
/// Series are built once from historical data and never mutated; the engine
/// only moves a cursor over them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Quote {
    pub fn new(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { timestamp, open, high, low, close }
    }

    /// Flat quote where every price equals `price`. Handy for tick data.
    pub fn flat(timestamp: NaiveDateTime, price: f64) -> Self {
        Self::new(timestamp, price, price, price, price)
    }

    /// True for a single-price tick (open = high = low = close).
    pub fn is_flat(&self) -> bool {
        self.open == self.close && self.high == self.close && self.low == self.close
    }

    /// Returns true if every price is finite and strictly positive.
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }

    /// Basic OHLC sanity check: high bounds the body from above, low from below.
    pub fn is_sane(&self) -> bool {
        self.is_finite()
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Field selector for cursor-relative series access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl PriceField {
    pub fn of(self, quote: &Quote) -> f64 {
        match self {
            PriceField::Open => quote.open,
            PriceField::High => quote.high,
            PriceField::Low => quote.low,
            PriceField::Close => quote.close,
        }
    }
}

/// Source of historical quotes for one symbol/period.
///
/// Implementations must return an ascending, duplicate-free series. The core
/// never calls a supplier itself; harnesses use one to build instruments.
pub trait QuoteSupplier {
    type Error: std::error::Error;

    fn quotes(&self, symbol: &str, period: &str) -> Result<Vec<Quote>, Self::Error>;
}
