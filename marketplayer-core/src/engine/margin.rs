//! Margin engine: per-position requirements, reservation, and margin calls.
//!
//! `required = lots * standard_lot / min(account_leverage, instrument_leverage)`,
//! converted from the instrument's base currency into the account currency and
//! rounded to the account currency's minor unit.

use super::error::{InvariantViolation, Rejection};
use crate::domain::money::round_money;
use crate::domain::{Account, Instrument};
use std::collections::HashMap;

/// Tolerance for float noise when comparing money amounts.
const MONEY_EPSILON: f64 = 1e-9;

/// Cross-rate lookup for currencies the instrument itself can't convert.
pub trait CurrencyConverter: Send + Sync {
    /// Units of `to` per unit of `from`.
    fn rate(&self, from: &str, to: &str) -> Option<f64>;
}

/// No cross rates: only instruments quoted in, or based on, the account
/// currency can be traded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCrossRates;

impl CurrencyConverter for NoCrossRates {
    fn rate(&self, _from: &str, _to: &str) -> Option<f64> {
        None
    }
}

/// Static rate table. Inverse lookups are derived automatically.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<(String, String), f64>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.set(from, to, rate);
        self
    }

    pub fn set(&mut self, from: &str, to: &str, rate: f64) {
        self.rates.insert((from.to_ascii_uppercase(), to.to_ascii_uppercase()), rate);
    }
}

impl CurrencyConverter for RateTable {
    fn rate(&self, from: &str, to: &str) -> Option<f64> {
        let from = from.to_ascii_uppercase();
        let to = to.to_ascii_uppercase();
        if from == to {
            return Some(1.0);
        }
        if let Some(rate) = self.rates.get(&(from.clone(), to.clone())) {
            return Some(*rate);
        }
        self.rates
            .get(&(to, from))
            .filter(|r| **r != 0.0)
            .map(|r| 1.0 / r)
    }
}

fn same_currency(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Account-currency value of one unit of the instrument's base currency.
///
/// Identity when the base is the account currency; the instrument's own bid
/// when it is quoted in the account currency; otherwise a cross rate.
pub fn margin_rate(
    instrument: &Instrument,
    account_currency: &str,
    rates: &dyn CurrencyConverter,
) -> Result<f64, Rejection> {
    let spec = instrument.spec();
    if same_currency(&spec.base_currency, account_currency) {
        Ok(1.0)
    } else if same_currency(&spec.quote_currency, account_currency) {
        Ok(instrument.bid())
    } else {
        rates.rate(&spec.base_currency, account_currency).ok_or_else(|| {
            Rejection::ConversionUnavailable {
                from: spec.base_currency.clone(),
                to: account_currency.to_string(),
            }
        })
    }
}

/// Account-currency value of one unit of the instrument's quote currency,
/// the currency price-space P&L is denominated in.
pub fn profit_rate(
    instrument: &Instrument,
    account_currency: &str,
    rates: &dyn CurrencyConverter,
) -> Result<f64, Rejection> {
    let spec = instrument.spec();
    if same_currency(&spec.quote_currency, account_currency) {
        Ok(1.0)
    } else if same_currency(&spec.base_currency, account_currency) {
        Ok(1.0 / instrument.bid())
    } else {
        rates.rate(&spec.quote_currency, account_currency).ok_or_else(|| {
            Rejection::ConversionUnavailable {
                from: spec.quote_currency.clone(),
                to: account_currency.to_string(),
            }
        })
    }
}

/// Unrounded margin for one lot, in account currency.
pub fn margin_per_lot(
    account: &Account,
    instrument: &Instrument,
    rates: &dyn CurrencyConverter,
) -> Result<f64, Rejection> {
    let spec = instrument.spec();
    let leverage = account.leverage().min(spec.leverage);
    let rate = margin_rate(instrument, account.base_currency(), rates)?;
    Ok(spec.standard_lot / leverage * rate)
}

/// Margin required to hold `lots` of `instrument`, rounded to the minor unit.
pub fn required_margin(
    account: &Account,
    instrument: &Instrument,
    lots: f64,
    rates: &dyn CurrencyConverter,
) -> Result<f64, Rejection> {
    let per_lot = margin_per_lot(account, instrument, rates)?;
    Ok(round_money(lots * per_lot, account.base_currency()))
}

/// Reserve `amount` of margin. Rejected when `margin + amount >= equity`.
pub fn reserve(account: &mut Account, amount: f64) -> Result<(), Rejection> {
    if account.margin + amount >= account.equity {
        return Err(Rejection::InsufficientMargin {
            required: amount,
            free: account.free_margin(),
        });
    }
    account.margin += amount;
    Ok(())
}

/// Check that `amount` can be released without driving margin negative.
pub(crate) fn check_release(account: &Account, amount: f64) -> Result<(), InvariantViolation> {
    if amount < 0.0 || amount > account.margin + MONEY_EPSILON {
        return Err(InvariantViolation::NegativeMargin {
            margin: account.margin,
            release: amount,
        });
    }
    Ok(())
}

/// Release `amount` of reserved margin.
pub fn release(account: &mut Account, amount: f64) -> Result<(), InvariantViolation> {
    check_release(account, amount)?;
    // Clamp float residue so a full release lands on exactly zero.
    account.margin = (account.margin - amount).max(0.0);
    if account.margin < MONEY_EPSILON {
        account.margin = 0.0;
    }
    Ok(())
}

/// Pure margin-call test: `equity * stop_level < margin`.
pub fn is_margin_call(equity: f64, margin: f64, stop_level: f64) -> bool {
    equity * stop_level < margin
}

/// Strictest stop level among instruments carrying open positions.
///
/// `None` when the account is flat, in which case no margin call applies.
pub fn effective_stop_level<'a>(
    account: &Account,
    instruments: impl IntoIterator<Item = &'a Instrument>,
) -> Option<f64> {
    instruments
        .into_iter()
        .filter(|inst| account.positions_for(inst.symbol()).next().is_some())
        .map(|inst| inst.spec().stop_level)
        .fold(None, |acc: Option<f64>, level| Some(acc.map_or(level, |a| a.max(level))))
}

/// Margin-call monitor, run once per tick after the clock advances.
/// Updates and returns the account's margin-call flag.
pub fn monitor<'a>(
    account: &mut Account,
    instruments: impl IntoIterator<Item = &'a Instrument>,
) -> bool {
    let flagged = match effective_stop_level(account, instruments) {
        Some(level) => is_margin_call(account.equity, account.margin, level),
        None => false,
    };
    if flagged && !account.margin_call {
        tracing::warn!(
            equity = account.equity,
            margin = account.margin,
            "margin call"
        );
    }
    account.margin_call = flagged;
    flagged
}
