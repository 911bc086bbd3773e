//! Percent-of-capacity sizing.

use super::{check_fraction, SizingError};
use crate::domain::{Account, Instrument};
use crate::engine::margin::{margin_per_lot, profit_rate, required_margin};
use crate::engine::CurrencyConverter;

/// Largest lot size that can be reserved without reaching equity and without
/// pushing `margin` above `equity * stop_level`.
///
/// Equity is taken after the fill: opening at the entry side and marking at the
/// exit side books the spread as a floating loss before margin is reserved.
pub fn max_lots(
    account: &Account,
    instrument: &Instrument,
    rates: &dyn CurrencyConverter,
) -> Result<f64, SizingError> {
    let per_lot = margin_per_lot(account, instrument, rates)?;
    let spread_per_lot = spread_cost_per_lot(account, instrument, rates)?;
    let equity = account.equity();
    let stop_level = instrument.spec().stop_level.min(1.0);
    let capacity = equity * stop_level - account.margin();
    if capacity <= 0.0 || per_lot <= 0.0 {
        return Ok(0.0);
    }

    let step = instrument.spec().lot_step;
    let mut lots = instrument.normalize_lots(capacity / (per_lot + spread_per_lot * stop_level));
    // Reservation rejects `margin + amount >= equity`, and rounding the margin
    // to the minor unit can land exactly on the ceiling.
    while lots > 0.0 {
        let margin = account.margin() + required_margin(account, instrument, lots, rates)?;
        let equity_after = equity - lots * spread_per_lot;
        if margin < equity_after && margin <= equity_after * stop_level {
            break;
        }
        lots = instrument.normalize_lots(lots - step);
    }
    Ok(lots.max(0.0))
}

/// Account-currency loss booked per lot at fill by the bid/ask spread.
fn spread_cost_per_lot(
    account: &Account,
    instrument: &Instrument,
    rates: &dyn CurrencyConverter,
) -> Result<f64, SizingError> {
    let spread = (instrument.ask() - instrument.bid()).max(0.0);
    if spread == 0.0 {
        return Ok(0.0);
    }
    let rate = profit_rate(instrument, account.base_currency(), rates)?;
    Ok(spread * instrument.spec().standard_lot * rate)
}

/// `min_lot + value * (max_lots - min_lot)`, floored to the lot step.
pub fn percent_lots(
    account: &Account,
    instrument: &Instrument,
    value: f64,
    rates: &dyn CurrencyConverter,
) -> Result<f64, SizingError> {
    check_fraction(value)?;
    let min_lot = instrument.spec().min_lot;
    let max = max_lots(account, instrument, rates)?;
    if max < min_lot {
        return Err(SizingError::NoMarginCapacity { max_lots: max, min_lot });
    }
    let lots = instrument.normalize_lots(min_lot + value * (max - min_lot));
    Ok(lots.max(min_lot))
}
