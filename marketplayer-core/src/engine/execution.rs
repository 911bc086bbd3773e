//! Order execution: validate a request, test it against the live price, fill it.
//!
//! Validation runs in a fixed order and the first failure wins:
//! 1. lots positive and finite, rounded to 2 decimals
//! 2. reference price: the requested price, or ask (buy) / bid (sell)
//! 3. stop loss on the losing side of the reference price (0 disables)
//! 4. take profit on the winning side of the reference price (0 disables)
//!
//! A valid order fills only if the reference price is within
//! `slippage_pips * pip_size` of the live price. The fill appends the position
//! and reserves its margin as one step: if the reservation fails the position
//! is rolled back and nothing observable changed.

use super::error::{Rejection, ValidationError};
use super::margin::{self, CurrencyConverter};
use crate::domain::money::round_to;
use crate::domain::{Account, Direction, Instrument, OrderRequest, Position};

/// Relative tolerance (in pips) for price comparisons.
const PIP_EPSILON: f64 = 1e-6;

/// Validate lots: positive, finite, rounded to 2 decimals, at least the minimum lot.
pub fn validate_lots(lots: f64, instrument: &Instrument) -> Result<f64, ValidationError> {
    if !lots.is_finite() || lots <= 0.0 {
        return Err(ValidationError::InvalidLots(lots));
    }
    let rounded = round_to(lots, 2);
    if rounded <= 0.0 {
        return Err(ValidationError::InvalidLots(lots));
    }
    let min_lot = instrument.spec().min_lot;
    if rounded + 1e-9 < min_lot {
        return Err(ValidationError::BelowMinimumLot { lots: rounded, min_lot });
    }
    Ok(rounded)
}

/// Validate protective levels against the reference price.
///
/// Buys need `stop_loss < reference < take_profit`, sells the mirror image.
/// A zero level is disabled and always valid.
pub fn validate_levels(
    direction: Direction,
    reference: f64,
    stop_loss: f64,
    take_profit: f64,
) -> Result<(), ValidationError> {
    let stop_ok = stop_loss.is_finite()
        && stop_loss >= 0.0
        && (stop_loss == 0.0
            || match direction {
                Direction::Buy => stop_loss < reference,
                Direction::Sell => stop_loss > reference,
            });
    if !stop_ok {
        return Err(ValidationError::InvalidStopLoss { stop_loss, reference });
    }

    let take_ok = take_profit.is_finite()
        && take_profit >= 0.0
        && (take_profit == 0.0
            || match direction {
                Direction::Buy => take_profit > reference,
                Direction::Sell => take_profit < reference,
            });
    if !take_ok {
        return Err(ValidationError::InvalidTakeProfit { take_profit, reference });
    }
    Ok(())
}

/// A request that passed validation, with its reference price resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub direction: Direction,
    pub lots: f64,
    pub reference_price: f64,
    pub slippage_pips: u32,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Run validation steps 1–4 without touching the account.
pub fn validate(request: &OrderRequest, instrument: &Instrument) -> Result<ValidatedOrder, ValidationError> {
    let lots = validate_lots(request.lots, instrument)?;

    let reference_price = match request.requested_price() {
        Some(price) if !price.is_finite() || price < 0.0 => {
            return Err(ValidationError::InvalidPrice(price));
        }
        Some(price) => price,
        None => instrument.entry_price(request.direction),
    };

    validate_levels(request.direction, reference_price, request.stop_loss, request.take_profit)?;

    Ok(ValidatedOrder {
        direction: request.direction,
        lots,
        reference_price,
        slippage_pips: request.slippage_pips,
        stop_loss: request.stop_loss,
        take_profit: request.take_profit,
    })
}

/// Whether `reference` is within `slippage_pips` of `live`.
pub fn within_slippage(reference: f64, live: f64, slippage_pips: u32, pip_size: f64) -> bool {
    (reference - live).abs() <= (slippage_pips as f64 + PIP_EPSILON) * pip_size
}

/// Validate, price-check, and fill a market order.
///
/// Returns a snapshot of the new position on success. Any rejection leaves the
/// account exactly as it was.
pub fn send_order(
    account: &mut Account,
    instrument: &Instrument,
    request: &OrderRequest,
    rates: &dyn CurrencyConverter,
) -> Result<Position, Rejection> {
    let order = match validate(request, instrument) {
        Ok(order) => order,
        Err(err) => {
            tracing::debug!(symbol = instrument.symbol(), error = %err, "order rejected");
            return Err(err.into());
        }
    };

    let live = instrument.entry_price(order.direction);
    if !within_slippage(order.reference_price, live, order.slippage_pips, instrument.spec().pip_size) {
        tracing::debug!(
            symbol = instrument.symbol(),
            requested = order.reference_price,
            live,
            "order rejected: price moved"
        );
        return Err(Rejection::PriceMoved { requested: order.reference_price, live });
    }

    let required = margin::required_margin(account, instrument, order.lots, rates)?;
    let profit_rate = margin::profit_rate(instrument, account.base_currency(), rates)?;

    // Opening at the entry side and marking at the exit side costs the spread.
    let exit = instrument.exit_price(order.direction);
    let ticket = account.tickets.next_ticket();
    let mut position = Position {
        ticket,
        symbol: instrument.symbol().to_string(),
        direction: order.direction,
        lots: order.lots,
        open_price: live,
        open_time: instrument.current_time(),
        stop_loss: order.stop_loss,
        take_profit: order.take_profit,
        margin: 0.0,
        profit: 0.0,
    };
    position.profit = position.gross_profit(exit, instrument.spec().standard_lot) * profit_rate;

    // Tentative append; rolled back below if the reservation fails.
    let equity_before = account.equity;
    account.equity += position.profit;
    account.positions.push(position);

    if let Err(rejection) = margin::reserve(account, required) {
        account.positions.pop();
        account.equity = equity_before;
        account.tickets.rewind(ticket);
        tracing::debug!(
            symbol = instrument.symbol(),
            required,
            free = account.free_margin(),
            "order rejected: insufficient margin"
        );
        return Err(rejection);
    }

    let filled = account
        .positions
        .last_mut()
        .ok_or(Rejection::NotFound(ticket))?;
    filled.margin = required;
    let filled = filled.clone();

    tracing::debug!(
        ticket = %filled.ticket,
        symbol = %filled.symbol,
        direction = ?filled.direction,
        lots = filled.lots,
        price = filled.open_price,
        margin = required,
        "order filled"
    );
    Ok(filled)
}
