//! Multi-instrument clock.
//!
//! Each `advance()` moves exactly one instrument: the one whose next tick is
//! chronologically earliest, ties broken by registration order. An instrument
//! sitting on its last tick steps onto `reached_end` at that tick's own
//! timestamp, so it is exhausted before any later tick of another instrument.

use super::error::InvariantViolation;
use crate::domain::{Instrument, InstrumentError};
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Default)]
pub struct MarketClock {
    instruments: Vec<Instrument>,
}

impl MarketClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an instrument. Returns its registration index.
    pub fn register(&mut self, instrument: Instrument) -> Result<usize, InstrumentError> {
        if self.index_of(instrument.symbol()).is_some() {
            return Err(InstrumentError::DuplicateSymbol(instrument.symbol().to_string()));
        }
        self.instruments.push(instrument);
        Ok(self.instruments.len() - 1)
    }

    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.instruments.iter().position(|i| i.symbol() == symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.symbol() == symbol)
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// True once every tracked instrument reached its end. An empty clock has ended.
    pub fn reached_end(&self) -> bool {
        self.instruments.iter().all(Instrument::reached_end)
    }

    /// Latest current-tick timestamp across instruments, i.e. the simulated "now".
    pub fn now(&self) -> Option<NaiveDateTime> {
        self.instruments.iter().map(Instrument::current_time).max()
    }

    /// Index of the instrument the next `advance()` would move.
    pub fn peek(&self) -> Option<usize> {
        self.instruments
            .iter()
            .enumerate()
            .filter(|(_, inst)| !inst.reached_end())
            .min_by_key(|(index, inst)| (Self::step_key(inst), *index))
            .map(|(index, _)| index)
    }

    /// Time at which the instrument's next step happens: its next tick, or
    /// its last tick for the step that exhausts it.
    fn step_key(instrument: &Instrument) -> NaiveDateTime {
        instrument
            .next_timestamp()
            .unwrap_or_else(|| instrument.current_time())
    }

    /// Advance the instrument with the earliest next tick and return its index.
    ///
    /// Calling this after `reached_end()` is an invariant violation.
    pub fn advance(&mut self) -> Result<usize, InvariantViolation> {
        let index = self.peek().ok_or(InvariantViolation::CursorPastEnd)?;
        self.instruments[index].advance();
        Ok(index)
    }
}
