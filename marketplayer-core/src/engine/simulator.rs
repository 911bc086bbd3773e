//! Simulator: one account, a clock of instruments, and the per-tick pipeline.
//!
//! Each `advance()` runs, in order:
//! 1. clock advance (one instrument, global time order)
//! 2. mark to market
//! 3. stop-loss / take-profit exits
//! 4. scheduled-order triggers
//! 5. margin-call monitor, then the liquidation policy while the call persists
//! 6. equity snapshot

use super::clock::MarketClock;
use super::error::{EngineError, InvariantViolation, Rejection};
use super::liquidation::{LiquidationPolicy, NoLiquidation};
use super::margin::{self, CurrencyConverter, NoCrossRates};
use super::{execution, lifecycle, scheduler};
use crate::domain::{
    Account, CloseReason, ClosedPosition, Instrument, InstrumentError, OrderKind, OrderRequest,
    PendingOrder, Position, Ticket,
};
use crate::sizers::{PositionSizing, SizingConfig, SizingError};
use chrono::NaiveDateTime;

/// What happened on one clock step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    /// Registration index of the instrument that moved.
    pub instrument: usize,
    pub protective_closes: Vec<ClosedPosition>,
    pub scheduled_fills: Vec<Position>,
    pub stop_outs: Vec<ClosedPosition>,
    pub margin_call: bool,
}

pub struct Simulator {
    account: Account,
    clock: MarketClock,
    rates: Box<dyn CurrencyConverter>,
    liquidation: Box<dyn LiquidationPolicy>,
    sizing: SizingConfig,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("account", &self.account)
            .field("clock", &self.clock)
            .field("liquidation", &self.liquidation.name())
            .field("sizing", &self.sizing)
            .finish()
    }
}

impl Simulator {
    pub fn new(account: Account) -> Self {
        Self {
            account,
            clock: MarketClock::new(),
            rates: Box::new(NoCrossRates),
            liquidation: Box::new(NoLiquidation),
            sizing: SizingConfig::default(),
        }
    }

    pub fn with_rates(mut self, rates: impl CurrencyConverter + 'static) -> Self {
        self.rates = Box::new(rates);
        self
    }

    pub fn with_liquidation(mut self, policy: impl LiquidationPolicy + 'static) -> Self {
        self.liquidation = Box::new(policy);
        self
    }

    pub fn with_sizing(mut self, sizing: SizingConfig) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn add_instrument(&mut self, instrument: Instrument) -> Result<usize, InstrumentError> {
        tracing::debug!(symbol = instrument.symbol(), ticks = instrument.len(), "instrument registered");
        self.clock.register(instrument)
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn clock(&self) -> &MarketClock {
        &self.clock
    }

    pub fn rates(&self) -> &dyn CurrencyConverter {
        self.rates.as_ref()
    }

    pub fn instrument(&self, symbol: &str) -> Result<&Instrument, Rejection> {
        self.clock
            .get(symbol)
            .ok_or_else(|| Rejection::UnknownInstrument(symbol.to_string()))
    }

    pub fn reached_end(&self) -> bool {
        self.clock.reached_end()
    }

    pub fn now(&self) -> Option<NaiveDateTime> {
        self.clock.now()
    }

    fn instrument_of(&self, ticket: Ticket) -> Result<&Instrument, Rejection> {
        let position = self.account.position(ticket).ok_or(Rejection::NotFound(ticket))?;
        self.instrument(&position.symbol)
    }

    // ── Trading operations ────────────────────────────────────────────

    pub fn send_order(&mut self, symbol: &str, request: &OrderRequest) -> Result<Position, Rejection> {
        let instrument = self
            .clock
            .get(symbol)
            .ok_or_else(|| Rejection::UnknownInstrument(symbol.to_string()))?;
        execution::send_order(&mut self.account, instrument, request, self.rates.as_ref())
    }

    pub fn schedule_order(
        &mut self,
        symbol: &str,
        kind: OrderKind,
        request: &OrderRequest,
    ) -> Result<Ticket, Rejection> {
        let instrument = self
            .clock
            .get(symbol)
            .ok_or_else(|| Rejection::UnknownInstrument(symbol.to_string()))?;
        scheduler::schedule_order(&mut self.account, instrument, kind, request)
    }

    pub fn cancel_order(&mut self, ticket: Ticket) -> Result<PendingOrder, Rejection> {
        scheduler::cancel_order(&mut self.account, ticket)
    }

    pub fn change_position(
        &mut self,
        ticket: Ticket,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<Position, Rejection> {
        let index = self.instrument_index_of(ticket)?;
        let instrument = &self.clock.instruments()[index];
        lifecycle::change_position(&mut self.account, instrument, ticket, stop_loss, take_profit)
    }

    pub fn close_position(&mut self, ticket: Ticket) -> Result<ClosedPosition, EngineError> {
        self.close_with_reason(ticket, CloseReason::Manual)
    }

    fn instrument_index_of(&self, ticket: Ticket) -> Result<usize, Rejection> {
        let symbol = self.instrument_of(ticket)?.symbol();
        self.clock
            .index_of(symbol)
            .ok_or_else(|| Rejection::UnknownInstrument(symbol.to_string()))
    }

    fn close_with_reason(&mut self, ticket: Ticket, reason: CloseReason) -> Result<ClosedPosition, EngineError> {
        let index = self.instrument_index_of(ticket)?;
        let instrument = &self.clock.instruments()[index];
        lifecycle::close_position(&mut self.account, instrument, ticket, self.rates.as_ref(), reason)
    }

    // ── Sizing ────────────────────────────────────────────────────────

    pub fn sizing(&self) -> PositionSizing<'_> {
        PositionSizing::new(&self.account, self.sizing)
    }

    pub fn percent(&self, symbol: &str, value: f64) -> Result<f64, SizingError> {
        self.sizing().percent(self.instrument(symbol)?, value, self.rates.as_ref())
    }

    pub fn kelly(&self, symbol: &str) -> Result<f64, SizingError> {
        self.sizing().kelly(self.instrument(symbol)?)
    }

    pub fn optimal_f(&self, symbol: &str) -> Result<f64, SizingError> {
        self.sizing().optimal_f(self.instrument(symbol)?)
    }

    pub fn secure_f(&self, symbol: &str) -> Result<f64, SizingError> {
        self.sizing().secure_f(self.instrument(symbol)?)
    }

    pub fn fractional_f(&self, symbol: &str, value: f64) -> Result<f64, SizingError> {
        self.sizing().fractional_f(self.instrument(symbol)?, value)
    }

    // ── Clock ─────────────────────────────────────────────────────────

    /// Advance the clock one step and run the per-tick pipeline.
    pub fn advance(&mut self) -> Result<TickEvents, InvariantViolation> {
        let index = self.clock.advance()?;
        let rates = self.rates.as_ref();
        let instruments = self.clock.instruments();

        lifecycle::refresh(&mut self.account, instruments, rates);
        let protective_closes = lifecycle::close_triggered_positions(&mut self.account, instruments, rates)?;
        let scheduled_fills = scheduler::execute_scheduled_orders(&mut self.account, instruments, rates);

        let mut stop_outs = Vec::new();
        let mut margin_call = margin::monitor(&mut self.account, instruments);
        while margin_call {
            let Some(ticket) = self.liquidation.next_to_close(&self.account) else {
                break;
            };
            let Some(inst) = self
                .account
                .position(ticket)
                .and_then(|p| instruments.iter().find(|i| i.symbol() == p.symbol))
            else {
                break;
            };
            match lifecycle::close_position(&mut self.account, inst, ticket, rates, CloseReason::StopOut) {
                Ok(closed) => {
                    tracing::warn!(%ticket, profit = closed.profit, policy = self.liquidation.name(), "stop out");
                    stop_outs.push(closed);
                }
                Err(EngineError::Fatal(violation)) => return Err(violation),
                Err(EngineError::Rejected(rejection)) => {
                    tracing::warn!(%ticket, error = %rejection, "stop out failed");
                    break;
                }
            }
            margin_call = margin::monitor(&mut self.account, instruments);
        }

        // The moved instrument may sit on a stale tick after an exhausting step.
        if let Some(timestamp) = self.now() {
            self.account.record_snapshot(timestamp);
        }

        Ok(TickEvents {
            instrument: index,
            protective_closes,
            scheduled_fills,
            stop_outs,
            margin_call,
        })
    }

    /// Recompute equity and margin from the open positions and compare.
    pub fn verify_invariants(&self) -> Result<(), InvariantViolation> {
        verify_account(&self.account)
    }
}

/// Check `equity == balance + Σ profit` and `margin == Σ position.margin`.
pub fn verify_account(account: &Account) -> Result<(), InvariantViolation> {
    // Absolute floor for small books, relative for large ones.
    let tolerance = |v: f64| 1e-6_f64.max(v.abs() * 1e-9);

    let expected_equity = account.balance() + account.floating_profit();
    if (account.equity() - expected_equity).abs() > tolerance(expected_equity) {
        return Err(InvariantViolation::EquityMismatch {
            equity: account.equity(),
            expected: expected_equity,
        });
    }

    let expected_margin: f64 = account.positions().iter().map(|p| p.margin).sum();
    if account.margin() < 0.0 || (account.margin() - expected_margin).abs() > tolerance(expected_margin) {
        return Err(InvariantViolation::MarginMismatch {
            margin: account.margin(),
            expected: expected_margin,
        });
    }
    Ok(())
}
