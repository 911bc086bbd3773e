//! Engine error taxonomy.
//!
//! `Rejection` covers every recoverable refusal: the caller may correct the
//! request and retry. `InvariantViolation` means the ledger can no longer be
//! trusted and the run must stop. The engine never retries on its own.

use crate::domain::Ticket;
use thiserror::Error;

/// Malformed order or modification parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("lot size must be positive and finite (got {0})")]
    InvalidLots(f64),

    #[error("lot size {lots} below instrument minimum {min_lot}")]
    BelowMinimumLot { lots: f64, min_lot: f64 },

    #[error("requested price must be positive and finite (got {0})")]
    InvalidPrice(f64),

    #[error("stop loss {stop_loss} invalid for reference price {reference}")]
    InvalidStopLoss { stop_loss: f64, reference: f64 },

    #[error("take profit {take_profit} invalid for reference price {reference}")]
    InvalidTakeProfit { take_profit: f64, reference: f64 },

    #[error("scheduled orders need a trigger price")]
    MissingTriggerPrice,
}

/// Recoverable refusal of a trading operation. No state was changed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error("price moved: requested {requested}, live {live}")]
    PriceMoved { requested: f64, live: f64 },

    #[error("insufficient margin: required {required}, free {free}")]
    InsufficientMargin { required: f64, free: f64 },

    #[error("position {ticket} is frozen: price within {band} of {level}")]
    Frozen { ticket: Ticket, level: f64, band: f64 },

    #[error("ticket {0} not found")]
    NotFound(Ticket),

    #[error("unknown instrument {0}")]
    UnknownInstrument(String),

    #[error("ticket {ticket} belongs to {expected}, not {actual}")]
    InstrumentMismatch { ticket: Ticket, expected: String, actual: String },

    #[error("no conversion rate from {from} to {to}")]
    ConversionUnavailable { from: String, to: String },
}

/// Broken ledger or clock invariant. Fatal for the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("releasing {release} would drive margin {margin} negative")]
    NegativeMargin { margin: f64, release: f64 },

    #[error("clock advanced after every instrument reached its end")]
    CursorPastEnd,

    #[error("equity {equity} != balance + floating {expected}")]
    EquityMismatch { equity: f64, expected: f64 },

    #[error("margin {margin} != reserved sum {expected}")]
    MarginMismatch { margin: f64, expected: f64 },
}

/// Either kind of engine failure, for operations that can hit both.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Fatal(#[from] InvariantViolation),
}

impl EngineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Fatal(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            EngineError::Rejected(r) => Some(r),
            EngineError::Fatal(_) => None,
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Rejected(Rejection::Validation(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_lifts_into_rejection() {
        let r: Rejection = ValidationError::InvalidLots(0.0).into();
        assert!(matches!(r, Rejection::Validation(ValidationError::InvalidLots(_))));
    }

    #[test]
    fn engine_error_classifies_fatal() {
        let e: EngineError = Rejection::NotFound(Ticket(1)).into();
        assert!(!e.is_fatal());
        assert_eq!(e.rejection(), Some(&Rejection::NotFound(Ticket(1))));

        let e: EngineError = InvariantViolation::CursorPastEnd.into();
        assert!(e.is_fatal());
        assert!(e.rejection().is_none());
    }

    #[test]
    fn messages_are_readable() {
        let r = Rejection::InsufficientMargin { required: 12.0, free: 10.0 };
        assert_eq!(r.to_string(), "insufficient margin: required 12, free 10");
    }
}
