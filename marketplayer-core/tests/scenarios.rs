//! Acceptance scenarios for the account ledger, execution, lifecycle, and clock.
//!
//! Tests:
//! 1. a 0.01 lot EURUSD buy reserves 12.00 margin
//! 2. the same order against 10.00 equity is rejected
//! 3. two instruments advance in global time order
//! 4. freeze band blocks a change near the open price
//! 5. Double close, change read-back, and degenerate order parameters

use chrono::{NaiveDate, NaiveDateTime};
use marketplayer_core::domain::{Account, Instrument, InstrumentSpec, OrderRequest, Quote, Ticket};
use marketplayer_core::engine::{
    EngineError, InvariantViolation, MarketClock, Rejection, Simulator, ValidationError,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn daily(symbol: &str, closes: &[f64]) -> Instrument {
    let series: Vec<Quote> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Quote::flat(ts(i as u32 + 1, 0), c))
        .collect();
    Instrument::new(InstrumentSpec::new(symbol), series).unwrap()
}

fn eurusd_simulator(equity: f64) -> Simulator {
    let account = Account::with_state(15_000.0, equity, 0.0, 100.0, "USD");
    let mut sim = Simulator::new(account);
    sim.add_instrument(daily("EURUSD", &[1.2000, 1.2000])).unwrap();
    sim
}

// ── Margin reservation ────────────────────────────────────────────────

#[test]
fn micro_lot_buy_reserves_margin_on_fill() {
    let mut sim = eurusd_simulator(15_000.0);
    let position = sim
        .send_order("EURUSD", &OrderRequest::buy(0.01).with_slippage(3))
        .unwrap();

    assert_eq!(position.margin, 12.0);
    assert_eq!(sim.account().margin(), 12.0);
    assert_eq!(sim.account().free_margin(), 14_988.0);
    assert!(sim.account().margin() < sim.account().equity());
    sim.verify_invariants().unwrap();
}

// ── Margin rejection ──────────────────────────────────────────────────

#[test]
fn insufficient_margin_changes_nothing() {
    let mut sim = eurusd_simulator(10.0);
    let result = sim.send_order("EURUSD", &OrderRequest::buy(0.01).with_slippage(3));

    assert!(matches!(result, Err(Rejection::InsufficientMargin { .. })));
    assert_eq!(sim.account().margin(), 0.0);
    assert!(sim.account().positions().is_empty());
}

// ── Clock ordering ────────────────────────────────────────────────────

#[test]
fn earlier_instrument_exhausted_first() {
    let t = 10;
    let a = Instrument::new(
        InstrumentSpec::new("EURUSD"),
        vec![Quote::flat(ts(1, t - 1), 1.2), Quote::flat(ts(1, t), 1.2)],
    )
    .unwrap();
    let b = Instrument::new(
        InstrumentSpec::new("GBPUSD"),
        vec![Quote::flat(ts(1, t - 1), 1.3), Quote::flat(ts(1, t + 1), 1.3)],
    )
    .unwrap();

    let mut clock = MarketClock::new();
    clock.register(a).unwrap();
    clock.register(b).unwrap();

    // A's next tick (T) comes before B's (T+1).
    assert_eq!(clock.advance(), Ok(0));
    assert_eq!(clock.instruments()[0].current_time(), ts(1, t));
    // A has no tick after T, so it steps off its end before B moves.
    assert_eq!(clock.advance(), Ok(0));
    assert!(clock.instruments()[0].reached_end());
    assert_eq!(clock.instruments()[1].cursor(), 0);
    assert!(!clock.reached_end());

    assert_eq!(clock.advance(), Ok(1));
    assert_eq!(clock.instruments()[1].current_time(), ts(1, t + 1));
    assert_eq!(clock.advance(), Ok(1));
    assert!(clock.reached_end());
    assert_eq!(clock.advance(), Err(InvariantViolation::CursorPastEnd));
}

// ── Freeze band ───────────────────────────────────────────────────────

#[test]
fn freeze_band_blocks_change_near_open() {
    let mut spec = InstrumentSpec::new("EURUSD");
    spec.freeze_level = 2.0;
    let series = vec![
        Quote::flat(ts(1, 0), 1.2000),
        Quote::flat(ts(2, 0), 1.2001),
        Quote::flat(ts(3, 0), 1.2100),
    ];
    let mut sim = Simulator::new(Account::new(15_000.0, 100.0, "USD"));
    sim.add_instrument(Instrument::new(spec, series).unwrap()).unwrap();
    let position = sim.send_order("EURUSD", &OrderRequest::buy(0.1)).unwrap();

    sim.advance().unwrap();
    let blocked = sim.change_position(position.ticket, Some(1.1800), Some(1.2500));
    assert!(matches!(blocked, Err(Rejection::Frozen { .. })));
    let unchanged = sim.account().position(position.ticket).unwrap();
    assert_eq!((unchanged.stop_loss, unchanged.take_profit), (0.0, 0.0));

    sim.advance().unwrap();
    sim.change_position(position.ticket, Some(1.1800), Some(1.2500))
        .unwrap();
    let changed = sim.account().position(position.ticket).unwrap();
    assert_eq!((changed.stop_loss, changed.take_profit), (1.1800, 1.2500));
}

// ── Lifecycle properties ─────────────────────────────────────────────

#[test]
fn second_close_is_rejected_and_state_unchanged() {
    let mut sim = eurusd_simulator(15_000.0);
    let position = sim.send_order("EURUSD", &OrderRequest::buy(0.5)).unwrap();
    sim.advance().unwrap();

    sim.close_position(position.ticket).unwrap();
    let after_first = (
        sim.account().balance(),
        sim.account().equity(),
        sim.account().margin(),
        sim.account().closed_positions().len(),
    );

    let second = sim.close_position(position.ticket);
    assert_eq!(
        second,
        Err(EngineError::Rejected(Rejection::NotFound(position.ticket)))
    );
    let after_second = (
        sim.account().balance(),
        sim.account().equity(),
        sim.account().margin(),
        sim.account().closed_positions().len(),
    );
    assert_eq!(after_first, after_second);
}

#[test]
fn change_then_read_returns_values_set() {
    let mut sim = eurusd_simulator(15_000.0);
    let position = sim.send_order("EURUSD", &OrderRequest::sell(0.1)).unwrap();

    sim.change_position(position.ticket, Some(1.2500), None).unwrap();
    let read = sim.account().position(position.ticket).unwrap();
    assert_eq!(read.stop_loss, 1.2500);
    assert_eq!(read.take_profit, 0.0);

    sim.change_position(position.ticket, None, Some(1.1500)).unwrap();
    let read = sim.account().position(position.ticket).unwrap();
    assert_eq!((read.stop_loss, read.take_profit), (1.2500, 1.1500));
}

#[test]
fn close_unknown_ticket_is_not_found() {
    let mut sim = eurusd_simulator(15_000.0);
    assert_eq!(
        sim.close_position(Ticket(42)),
        Err(EngineError::Rejected(Rejection::NotFound(Ticket(42))))
    );
}

// ── Degenerate orders ────────────────────────────────────────────────

#[test]
fn non_positive_lots_always_rejected() {
    let mut sim = eurusd_simulator(15_000.0);
    for lots in [0.0, -0.01, -5.0, f64::NAN] {
        let result = sim.send_order("EURUSD", &OrderRequest::buy(lots));
        assert!(
            matches!(result, Err(Rejection::Validation(ValidationError::InvalidLots(_)))),
            "lots {lots} gave {result:?}"
        );
    }
    assert!(sim.account().positions().is_empty());
}

#[test]
fn take_profit_at_reference_price_rejected() {
    let mut sim = eurusd_simulator(15_000.0);
    let buy = sim.send_order("EURUSD", &OrderRequest::buy(0.1).with_take_profit(1.2000));
    assert!(matches!(
        buy,
        Err(Rejection::Validation(ValidationError::InvalidTakeProfit { .. }))
    ));
    let explicit = OrderRequest::buy(0.1).with_price(1.2001).with_take_profit(1.2001);
    assert!(matches!(
        sim.send_order("EURUSD", &explicit),
        Err(Rejection::Validation(ValidationError::InvalidTakeProfit { .. }))
    ));
}

#[test]
fn price_outside_slippage_rejected() {
    let mut sim = eurusd_simulator(15_000.0);
    let inside = OrderRequest::buy(0.1).with_price(1.2003).with_slippage(3);
    assert!(sim.send_order("EURUSD", &inside).is_ok());
    let outside = OrderRequest::buy(0.1).with_price(1.2004).with_slippage(3);
    assert!(matches!(
        sim.send_order("EURUSD", &outside),
        Err(Rejection::PriceMoved { .. })
    ));
    assert_eq!(sim.account().positions().len(), 1);
}
