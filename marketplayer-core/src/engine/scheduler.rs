//! Scheduled orders: placement, cancellation, and per-tick triggering.

use super::error::{Rejection, ValidationError};
use super::execution::{self, validate_levels, validate_lots};
use super::margin::CurrencyConverter;
use crate::domain::{Account, Instrument, OrderKind, OrderRequest, PendingOrder, Position, Ticket};

/// Place an order to be filled once its trigger price is touched.
///
/// The request's direction is taken from `kind`. Pending kinds need a trigger
/// price (`request.price`); a `Market` kind without one triggers at the current
/// entry price on the next tick. Lots and protective levels are validated
/// against the trigger price now, so a stored order is always well formed.
pub fn schedule_order(
    account: &mut Account,
    instrument: &Instrument,
    kind: OrderKind,
    request: &OrderRequest,
) -> Result<Ticket, Rejection> {
    let direction = kind.direction();
    let lots = validate_lots(request.lots, instrument)?;
    let trigger_price = match (kind, request.requested_price()) {
        (_, Some(price)) if !price.is_finite() || price < 0.0 => {
            return Err(ValidationError::InvalidPrice(price).into());
        }
        (_, Some(price)) => price,
        (OrderKind::Market(_), None) => instrument.entry_price(direction),
        (_, None) => return Err(ValidationError::MissingTriggerPrice.into()),
    };
    validate_levels(direction, trigger_price, request.stop_loss, request.take_profit)?;

    let ticket = account.tickets.next_ticket();
    let mut request = request.clone();
    request.direction = direction;
    request.lots = lots;
    request.price = Some(trigger_price);

    account.orders.push(PendingOrder {
        ticket,
        symbol: instrument.symbol().to_string(),
        kind,
        trigger_price,
        request,
        placed_at: instrument.current_time(),
    });
    tracing::debug!(%ticket, symbol = instrument.symbol(), ?kind, trigger_price, "order scheduled");
    Ok(ticket)
}

/// Remove a pending order.
pub fn cancel_order(account: &mut Account, ticket: Ticket) -> Result<PendingOrder, Rejection> {
    let index = account
        .orders
        .iter()
        .position(|o| o.ticket == ticket)
        .ok_or(Rejection::NotFound(ticket))?;
    let order = account.orders.remove(index);
    tracing::debug!(%ticket, "order cancelled");
    Ok(order)
}

/// Send every triggered pending order through the execution engine at its
/// trigger price, in placement order.
///
/// Triggered orders leave the pending book whether they fill or not; rejected
/// ones are logged and dropped. Orders on instruments not in `instruments` are
/// dropped too. Returns the positions opened.
pub fn execute_scheduled_orders(
    account: &mut Account,
    instruments: &[Instrument],
    rates: &dyn CurrencyConverter,
) -> Vec<Position> {
    let pending = std::mem::take(&mut account.orders);
    let mut kept = Vec::with_capacity(pending.len());
    let mut filled = Vec::new();

    for order in pending {
        let Some(instrument) = instruments.iter().find(|i| i.symbol() == order.symbol) else {
            tracing::warn!(ticket = %order.ticket, symbol = %order.symbol, "scheduled order on unknown instrument dropped");
            continue;
        };
        if !order.is_triggered(instrument.bid(), instrument.ask()) {
            kept.push(order);
            continue;
        }
        match execution::send_order(account, instrument, &order.request, rates) {
            Ok(position) => {
                tracing::debug!(order = %order.ticket, position = %position.ticket, "scheduled order filled");
                filled.push(position);
            }
            Err(rejection) => {
                tracing::debug!(order = %order.ticket, error = %rejection, "scheduled order dropped");
            }
        }
    }

    account.orders = kept;
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, InstrumentSpec, Quote};
    use crate::engine::margin::NoCrossRates;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn eurusd(closes: &[f64]) -> Instrument {
        let series: Vec<Quote> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Quote::flat(ts(i as u32 + 1), c))
            .collect();
        Instrument::new(InstrumentSpec::new("EURUSD"), series).unwrap()
    }

    #[test]
    fn pending_kinds_need_a_trigger_price() {
        let inst = eurusd(&[1.2]);
        let mut account = Account::new(15_000.0, 100.0, "USD");
        let err = schedule_order(&mut account, &inst, OrderKind::BuyLimit, &OrderRequest::buy(0.1));
        assert_eq!(err, Err(Rejection::Validation(ValidationError::MissingTriggerPrice)));
        assert!(account.orders().is_empty());
    }

    #[test]
    fn levels_validated_against_trigger_price() {
        let inst = eurusd(&[1.2]);
        let mut account = Account::new(15_000.0, 100.0, "USD");
        let req = OrderRequest::sell(0.1).with_price(1.1900).with_stop_loss(1.1850);
        let err = schedule_order(&mut account, &inst, OrderKind::SellStop, &req);
        assert!(matches!(err, Err(Rejection::Validation(ValidationError::InvalidStopLoss { .. }))));
    }

    #[test]
    fn direction_comes_from_kind() {
        let inst = eurusd(&[1.2]);
        let mut account = Account::new(15_000.0, 100.0, "USD");
        let req = OrderRequest::sell(0.1).with_price(1.1900);
        schedule_order(&mut account, &inst, OrderKind::BuyLimit, &req).unwrap();
        assert_eq!(account.orders()[0].request.direction, Direction::Buy);
    }

    #[test]
    fn buy_limit_fills_when_ask_drops_to_trigger() {
        let mut inst = eurusd(&[1.2000, 1.1950, 1.1900]);
        let mut account = Account::new(15_000.0, 100.0, "USD");
        let req = OrderRequest::buy(0.1).with_price(1.1900);
        let ticket = schedule_order(&mut account, &inst, OrderKind::BuyLimit, &req).unwrap();

        inst.advance();
        assert!(execute_scheduled_orders(&mut account, std::slice::from_ref(&inst), &NoCrossRates).is_empty());
        assert_eq!(account.orders().len(), 1);

        inst.advance();
        let filled = execute_scheduled_orders(&mut account, std::slice::from_ref(&inst), &NoCrossRates);
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].open_price, 1.1900);
        // The fill opens a position under a fresh ticket; the order's ticket is retired.
        assert_ne!(filled[0].ticket, ticket);
        assert!(account.position(ticket).is_none());
        assert!(account.position(filled[0].ticket).is_some());
        assert_eq!(cancel_order(&mut account, ticket), Err(Rejection::NotFound(ticket)));
        assert!(account.orders().is_empty());
    }

    #[test]
    fn gapped_stop_is_dropped_as_price_moved() {
        let mut inst = eurusd(&[1.2000, 1.2100]);
        let mut account = Account::new(15_000.0, 100.0, "USD");
        let req = OrderRequest::buy(0.1).with_price(1.2010).with_slippage(3);
        schedule_order(&mut account, &inst, OrderKind::BuyStop, &req).unwrap();

        inst.advance();
        let filled = execute_scheduled_orders(&mut account, std::slice::from_ref(&inst), &NoCrossRates);
        assert!(filled.is_empty());
        assert!(account.orders().is_empty());
        assert!(account.positions().is_empty());
    }

    #[test]
    fn cancel_removes_pending_order() {
        let inst = eurusd(&[1.2]);
        let mut account = Account::new(15_000.0, 100.0, "USD");
        let req = OrderRequest::sell(0.1).with_price(1.2100);
        let ticket = schedule_order(&mut account, &inst, OrderKind::SellLimit, &req).unwrap();
        assert_eq!(cancel_order(&mut account, ticket).unwrap().ticket, ticket);
        assert_eq!(cancel_order(&mut account, ticket), Err(Rejection::NotFound(ticket)));
    }
}
