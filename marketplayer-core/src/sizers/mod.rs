//! Position sizing: pure capital-allocation functions.
//!
//! History-based sizers read the account's closed positions on one instrument,
//! normalised to realized P&L per lot, and refuse to answer below
//! `SizingConfig::min_observations` samples.

pub mod kelly;
pub mod optimal_f;
pub mod percent;

pub use kelly::kelly_fraction;
pub use optimal_f::{fraction_to_lots, optimal_f, secure_f};
pub use percent::{max_lots, percent_lots};

use crate::domain::{Account, Instrument};
use crate::engine::{CurrencyConverter, Rejection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default minimum number of closed trades a history-based sizer needs.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 30;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("insufficient history: {available} trades, need {required}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("fraction {0} outside [0, 1]")]
    FractionOutOfRange(f64),

    #[error("no margin capacity: max {max_lots} lots below minimum {min_lot}")]
    NoMarginCapacity { max_lots: f64, min_lot: f64 },

    #[error("no losing trade to scale the fraction by")]
    NoLossObserved,

    #[error(transparent)]
    Pricing(#[from] Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingConfig {
    pub min_observations: usize,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self { min_observations: DEFAULT_MIN_OBSERVATIONS }
    }
}

/// Realized P&L per lot of every closed position on `symbol`, oldest first.
pub fn trade_outcomes(account: &Account, symbol: &str) -> Vec<f64> {
    account.closed_for(symbol).map(|c| c.profit_per_lot()).collect()
}

/// Largest per-lot loss as a positive number, if any trade lost.
pub fn largest_loss(outcomes: &[f64]) -> Option<f64> {
    outcomes
        .iter()
        .filter(|x| **x < 0.0)
        .map(|x| -x)
        .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
}

fn check_fraction(value: f64) -> Result<(), SizingError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SizingError::FractionOutOfRange(value));
    }
    Ok(())
}

/// Sizing queries bound to one account's state and history.
#[derive(Debug, Clone, Copy)]
pub struct PositionSizing<'a> {
    account: &'a Account,
    config: SizingConfig,
}

impl<'a> PositionSizing<'a> {
    pub fn new(account: &'a Account, config: SizingConfig) -> Self {
        Self { account, config }
    }

    /// Per-lot outcomes on `instrument`, or `InsufficientHistory`.
    pub fn history(&self, instrument: &Instrument) -> Result<Vec<f64>, SizingError> {
        let outcomes = trade_outcomes(self.account, instrument.symbol());
        if outcomes.len() < self.config.min_observations {
            return Err(SizingError::InsufficientHistory {
                required: self.config.min_observations,
                available: outcomes.len(),
            });
        }
        Ok(outcomes)
    }

    /// Lots interpolated between the minimum lot (`value = 0`) and the largest
    /// size that neither fails margin reservation nor triggers a margin call
    /// (`value = 1`). Needs no history.
    pub fn percent(
        &self,
        instrument: &Instrument,
        value: f64,
        rates: &dyn CurrencyConverter,
    ) -> Result<f64, SizingError> {
        percent_lots(self.account, instrument, value, rates)
    }

    pub fn kelly(&self, instrument: &Instrument) -> Result<f64, SizingError> {
        Ok(kelly_fraction(&self.history(instrument)?))
    }

    pub fn optimal_f(&self, instrument: &Instrument) -> Result<f64, SizingError> {
        Ok(optimal_f(&self.history(instrument)?))
    }

    pub fn secure_f(&self, instrument: &Instrument) -> Result<f64, SizingError> {
        Ok(secure_f(&self.history(instrument)?))
    }

    /// `value * optimal_f + (1 - value) * secure_f`.
    pub fn fractional_f(&self, instrument: &Instrument, value: f64) -> Result<f64, SizingError> {
        check_fraction(value)?;
        let outcomes = self.history(instrument)?;
        Ok(optimal_f::fractional_f(&outcomes, value))
    }

    /// Lots for fraction `f` of equity, risking the largest historical loss per lot.
    pub fn lots_for_fraction(&self, instrument: &Instrument, f: f64) -> Result<f64, SizingError> {
        check_fraction(f)?;
        let outcomes = self.history(instrument)?;
        let loss = largest_loss(&outcomes).ok_or(SizingError::NoLossObserved)?;
        fraction_to_lots(f, self.account.equity(), loss, instrument)
    }
}
