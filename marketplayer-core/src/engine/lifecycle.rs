//! Position lifecycle: amend, close, mark to market, protective exits.
//!
//! Positions are only mutated through these functions so the ledger identities
//! (`equity == balance + Σ profit`, `margin == Σ position.margin`) hold after
//! every call.

use super::error::{EngineError, InvariantViolation, Rejection, ValidationError};
use super::margin::{self, CurrencyConverter};
use crate::domain::money::round_money;
use crate::domain::{Account, CloseReason, ClosedPosition, Direction, Instrument, Position, Ticket};

/// Absolute tolerance for the freeze-band comparison.
const FREEZE_EPSILON: f64 = 1e-9;

/// Price a position is marked and closed at: bid for longs, ask for shorts.
pub fn mark_price(instrument: &Instrument, direction: Direction) -> f64 {
    instrument.exit_price(direction)
}

/// Freeze band around the current price, in price units. Zero disables freezing.
pub fn freeze_band(instrument: &Instrument) -> f64 {
    instrument.pips_to_price(instrument.spec().freeze_level)
}

fn check_symbol(position: &Position, instrument: &Instrument) -> Result<(), Rejection> {
    if position.symbol != instrument.symbol() {
        return Err(Rejection::InstrumentMismatch {
            ticket: position.ticket,
            expected: position.symbol.clone(),
            actual: instrument.symbol().to_string(),
        });
    }
    Ok(())
}

/// Reject if `level` sits inside the freeze band around `current`.
fn check_frozen(ticket: Ticket, level: f64, current: f64, band: f64) -> Result<(), Rejection> {
    if band > 0.0 && (level - current).abs() <= band + FREEZE_EPSILON {
        return Err(Rejection::Frozen { ticket, level, band });
    }
    Ok(())
}

/// Amend the stop-loss and/or take-profit of an open position.
///
/// `None` keeps the current value; `Some(0.0)` disables the level. The position's
/// open price and every proposed nonzero level are tested against the freeze
/// band; any breach blocks the whole change. Both fields update together.
pub fn change_position(
    account: &mut Account,
    instrument: &Instrument,
    ticket: Ticket,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
) -> Result<Position, Rejection> {
    let index = account.position_index(ticket).ok_or(Rejection::NotFound(ticket))?;
    let position = &account.positions[index];
    check_symbol(position, instrument)?;

    let current = mark_price(instrument, position.direction);
    if let Some(sl) = stop_loss {
        if !sl.is_finite() || sl < 0.0 {
            return Err(ValidationError::InvalidStopLoss { stop_loss: sl, reference: current }.into());
        }
    }
    if let Some(tp) = take_profit {
        if !tp.is_finite() || tp < 0.0 {
            return Err(ValidationError::InvalidTakeProfit { take_profit: tp, reference: current }.into());
        }
    }

    let band = freeze_band(instrument);
    let frozen = check_frozen(ticket, position.open_price, current, band)
        .and_then(|_| match stop_loss {
            Some(sl) if sl != 0.0 => check_frozen(ticket, sl, current, band),
            _ => Ok(()),
        })
        .and_then(|_| match take_profit {
            Some(tp) if tp != 0.0 => check_frozen(ticket, tp, current, band),
            _ => Ok(()),
        });
    if let Err(rejection) = frozen {
        tracing::debug!(%ticket, current, band, "change rejected: frozen");
        return Err(rejection);
    }

    let position = &mut account.positions[index];
    if let Some(sl) = stop_loss {
        position.stop_loss = sl;
    }
    if let Some(tp) = take_profit {
        position.take_profit = tp;
    }
    tracing::debug!(
        %ticket,
        stop_loss = position.stop_loss,
        take_profit = position.take_profit,
        "position changed"
    );
    Ok(position.clone())
}

/// Close an open position at the current mark price.
///
/// Removes it from the open book, releases its margin, books the realized P&L
/// into balance, and appends it to the closed book. Unknown or already-closed
/// tickets are rejected with `NotFound` and change nothing.
pub fn close_position(
    account: &mut Account,
    instrument: &Instrument,
    ticket: Ticket,
    rates: &dyn CurrencyConverter,
    reason: CloseReason,
) -> Result<ClosedPosition, EngineError> {
    let index = account.position_index(ticket).ok_or(Rejection::NotFound(ticket))?;
    let position = &account.positions[index];
    check_symbol(position, instrument)?;

    // Everything fallible happens before the first mutation.
    let close_price = mark_price(instrument, position.direction);
    let rate = margin::profit_rate(instrument, account.base_currency(), rates)?;
    let realized = round_money(
        position.gross_profit(close_price, instrument.spec().standard_lot) * rate,
        account.base_currency(),
    );
    margin::check_release(account, position.margin)?;

    let position = account.positions.remove(index);
    margin::release(account, position.margin)?;
    account.balance += realized;
    account.equity += realized - position.profit;

    let closed = ClosedPosition {
        position,
        close_price,
        close_time: instrument.current_time(),
        profit: realized,
        reason,
    };
    tracing::debug!(
        %ticket,
        symbol = %closed.position.symbol,
        price = close_price,
        profit = realized,
        reason = ?reason,
        "position closed"
    );
    account.closed_positions.push(closed.clone());
    Ok(closed)
}

/// Recompute every position's floating P&L and the account equity.
///
/// A position whose instrument is not in `instruments`, or whose profit can't
/// be converted, keeps its last marked value.
pub fn refresh(account: &mut Account, instruments: &[Instrument], rates: &dyn CurrencyConverter) {
    let currency = account.base_currency.clone();
    for position in account.positions.iter_mut() {
        let Some(instrument) = instruments.iter().find(|i| i.symbol() == position.symbol) else {
            continue;
        };
        let Ok(rate) = margin::profit_rate(instrument, &currency, rates) else {
            continue;
        };
        let price = mark_price(instrument, position.direction);
        position.profit = position.gross_profit(price, instrument.spec().standard_lot) * rate;
    }
    account.equity = account.balance + account.floating_profit();
}

/// Which protective level, if any, the current price has crossed.
/// A stop loss takes precedence when both are crossed on the same tick.
pub fn protective_hit(position: &Position, instrument: &Instrument) -> Option<CloseReason> {
    let price = mark_price(instrument, position.direction);
    if position.stop_loss_hit(price) {
        Some(CloseReason::StopLoss)
    } else if position.take_profit_hit(price) {
        Some(CloseReason::TakeProfit)
    } else {
        None
    }
}

/// Close every position whose stop loss or take profit was crossed.
///
/// Recoverable failures (e.g. a missing conversion rate) leave the position
/// open and are logged; invariant violations abort.
pub fn close_triggered_positions(
    account: &mut Account,
    instruments: &[Instrument],
    rates: &dyn CurrencyConverter,
) -> Result<Vec<ClosedPosition>, InvariantViolation> {
    let hits: Vec<(Ticket, usize, CloseReason)> = account
        .positions
        .iter()
        .filter_map(|p| {
            let idx = instruments.iter().position(|i| i.symbol() == p.symbol)?;
            protective_hit(p, &instruments[idx]).map(|reason| (p.ticket, idx, reason))
        })
        .collect();

    let mut closed = Vec::with_capacity(hits.len());
    for (ticket, idx, reason) in hits {
        match close_position(account, &instruments[idx], ticket, rates, reason) {
            Ok(c) => closed.push(c),
            Err(EngineError::Fatal(violation)) => return Err(violation),
            Err(EngineError::Rejected(rejection)) => {
                tracing::warn!(%ticket, error = %rejection, "protective close failed");
            }
        }
    }
    Ok(closed)
}
