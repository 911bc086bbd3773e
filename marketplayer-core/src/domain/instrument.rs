//! Instrument feed: historical series, trading parameters, and a read cursor.
//!
//! The cursor points at the current tick. `value_at(field, lag)` reads `lag`
//! ticks behind it; negative lags are unavailable rather than an error. The
//! series itself is shared (`Arc<[Quote]>`) so independent runs can reuse it
//! while each owns its own cursor.

use super::money::{floor_to_step, round_to};
use super::order::Direction;
use super::quote::{PriceField, Quote};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Static trading parameters of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Short name, e.g. `EURUSD`.
    pub symbol: String,
    /// Full name, e.g. `Euro vs US Dollar`.
    pub full_name: String,
    pub base_currency: String,
    pub quote_currency: String,
    /// Maximum leverage the broker grants on this instrument.
    pub leverage: f64,
    /// Smallest quoted price increment.
    pub pip_size: f64,
    /// Price precision in decimal digits.
    pub digits: u32,
    /// Margin call when `equity * stop_level < margin` (1.0 = 100%).
    pub stop_level: f64,
    /// Freeze band in pips around the current price.
    pub freeze_level: f64,
    /// Units per standard lot.
    pub standard_lot: f64,
    pub min_lot: f64,
    pub lot_step: f64,
    /// Period label of the series (`M1`, `H1`, `D1`, ...).
    pub period: String,
    /// Lookback reserved before the first tradable tick; the cursor starts here.
    pub shift: usize,
    #[serde(default)]
    pub mode: SeriesMode,
}

/// Shape of an instrument's series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeriesMode {
    /// Candlesticks: open, high, low and close per period.
    #[default]
    Ohlc,
    /// Single-price ticks, stored as flat quotes.
    Tick,
}

impl InstrumentSpec {
    /// Forex defaults: 1:100, 0.0001 pip, 5 digits, 100k lot, 0.01 min/step.
    ///
    /// Six-letter symbols are split into base/quote (`EURUSD` → EUR/USD);
    /// anything else is treated as quoted in USD.
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        let (base, quote) = if symbol.len() == 6 && symbol.is_ascii() {
            (symbol[..3].to_string(), symbol[3..].to_string())
        } else {
            (symbol.clone(), "USD".to_string())
        };
        Self {
            full_name: symbol.clone(),
            symbol,
            base_currency: base,
            quote_currency: quote,
            leverage: 100.0,
            pip_size: 0.0001,
            digits: 5,
            stop_level: 1.0,
            freeze_level: 0.0,
            standard_lot: 100_000.0,
            min_lot: 0.01,
            lot_step: 0.01,
            period: "D1".to_string(),
            shift: 0,
            mode: SeriesMode::Ohlc,
        }
    }

    fn validate(&self) -> Result<(), InstrumentError> {
        let positive = |name: &'static str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(InstrumentError::InvalidParameter { symbol: self.symbol.clone(), name, value: v })
            }
        };
        positive("leverage", self.leverage)?;
        positive("pip_size", self.pip_size)?;
        positive("standard_lot", self.standard_lot)?;
        positive("min_lot", self.min_lot)?;
        positive("lot_step", self.lot_step)?;
        if !(self.stop_level.is_finite() && self.stop_level >= 0.0) {
            return Err(InstrumentError::InvalidParameter {
                symbol: self.symbol.clone(),
                name: "stop_level",
                value: self.stop_level,
            });
        }
        if !(self.freeze_level.is_finite() && self.freeze_level >= 0.0) {
            return Err(InstrumentError::InvalidParameter {
                symbol: self.symbol.clone(),
                name: "freeze_level",
                value: self.freeze_level,
            });
        }
        Ok(())
    }
}

/// How bid/ask are derived from the series close.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SpreadModel {
    /// bid = ask = close.
    #[default]
    Zero,
    /// bid = close, ask = close + spread.
    FixedPips(f64),
}

#[derive(Debug, Error, PartialEq)]
pub enum InstrumentError {
    #[error("{symbol}: empty quote series")]
    EmptySeries { symbol: String },

    #[error("{symbol}: timestamps not strictly ascending at index {index}")]
    Unordered { symbol: String, index: usize },

    #[error("{symbol}: non-finite or non-positive price at index {index}")]
    InvalidQuote { symbol: String, index: usize },

    #[error("{symbol}: tick series carries a candlestick at index {index}")]
    NotTick { symbol: String, index: usize },

    #[error("{symbol}: shift {shift} exceeds series length {len}")]
    ShiftOutOfRange { symbol: String, shift: usize, len: usize },

    #[error("{symbol}: invalid {name} = {value}")]
    InvalidParameter { symbol: String, name: &'static str, value: f64 },

    #[error("instrument {0} already registered")]
    DuplicateSymbol(String),
}

/// A tradable instrument: parameters, an immutable series, and a cursor.
#[derive(Debug, Clone)]
pub struct Instrument {
    spec: InstrumentSpec,
    series: Arc<[Quote]>,
    cursor: usize,
    spread: SpreadModel,
}

impl Instrument {
    /// Build an instrument over a validated series. The cursor starts at `spec.shift`.
    pub fn new(spec: InstrumentSpec, series: impl Into<Arc<[Quote]>>) -> Result<Self, InstrumentError> {
        spec.validate()?;
        let series: Arc<[Quote]> = series.into();
        if series.is_empty() {
            return Err(InstrumentError::EmptySeries { symbol: spec.symbol });
        }
        for (index, quote) in series.iter().enumerate() {
            if !quote.is_finite() {
                return Err(InstrumentError::InvalidQuote { symbol: spec.symbol, index });
            }
            if index > 0 && series[index - 1].timestamp >= quote.timestamp {
                return Err(InstrumentError::Unordered { symbol: spec.symbol, index });
            }
            if spec.mode == SeriesMode::Tick && !quote.is_flat() {
                return Err(InstrumentError::NotTick { symbol: spec.symbol, index });
            }
        }
        if spec.shift >= series.len() {
            return Err(InstrumentError::ShiftOutOfRange {
                symbol: spec.symbol,
                shift: spec.shift,
                len: series.len(),
            });
        }
        Ok(Self { cursor: spec.shift, spec, series, spread: SpreadModel::Zero })
    }

    pub fn with_spread(mut self, spread: SpreadModel) -> Self {
        self.spread = spread;
        self
    }

    pub fn spec(&self) -> &InstrumentSpec {
        &self.spec
    }

    pub fn symbol(&self) -> &str {
        &self.spec.symbol
    }

    pub fn spread(&self) -> SpreadModel {
        self.spread
    }

    pub fn is_ohlc(&self) -> bool {
        self.spec.mode == SeriesMode::Ohlc
    }

    pub fn is_tick(&self) -> bool {
        self.spec.mode == SeriesMode::Tick
    }

    /// The shared series, for reuse by another run.
    pub fn series(&self) -> &Arc<[Quote]> {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    // ── Cursor ─────────────────────────────────────────────────────────

    /// Move the cursor one tick forward. No-op once the end is reached;
    /// returns whether the cursor moved.
    pub fn advance(&mut self) -> bool {
        if self.reached_end() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn reached_end(&self) -> bool {
        self.cursor >= self.series.len()
    }

    /// Timestamp of the tick the next `advance()` makes current, if any.
    pub fn next_timestamp(&self) -> Option<NaiveDateTime> {
        self.series.get(self.cursor + 1).map(|q| q.timestamp)
    }

    // ── Series access ──────────────────────────────────────────────────

    fn quote_at(&self, lag: isize) -> Option<&Quote> {
        if lag < 0 {
            return None;
        }
        let index = self.cursor.checked_sub(lag as usize)?;
        self.series.get(index)
    }

    /// Field value `lag` ticks behind the cursor. `None` for negative lags,
    /// lags reaching before the series start, or a cursor past the end.
    pub fn value_at(&self, field: PriceField, lag: isize) -> Option<f64> {
        self.quote_at(lag).map(|q| field.of(q))
    }

    pub fn timestamp_at(&self, lag: isize) -> Option<NaiveDateTime> {
        self.quote_at(lag).map(|q| q.timestamp)
    }

    /// Most recent quote at or before the cursor. Once the series is exhausted
    /// this stays on the last tick so open positions keep a mark price.
    pub fn current_quote(&self) -> &Quote {
        let index = self.cursor.min(self.series.len() - 1);
        &self.series[index]
    }

    pub fn current_time(&self) -> NaiveDateTime {
        self.current_quote().timestamp
    }

    // ── Prices ─────────────────────────────────────────────────────────

    pub fn bid(&self) -> f64 {
        self.normalize_price(self.current_quote().close)
    }

    pub fn ask(&self) -> f64 {
        let close = self.current_quote().close;
        match self.spread {
            SpreadModel::Zero => self.normalize_price(close),
            SpreadModel::FixedPips(pips) => self.normalize_price(close + self.pips_to_price(pips)),
        }
    }

    /// Price at which a new position in `direction` opens (ask for buys).
    pub fn entry_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Buy => self.ask(),
            Direction::Sell => self.bid(),
        }
    }

    /// Price at which an existing position in `direction` closes (bid for longs).
    pub fn exit_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Buy => self.bid(),
            Direction::Sell => self.ask(),
        }
    }

    // ── Conversions ────────────────────────────────────────────────────

    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.spec.pip_size
    }

    /// Round a price to the instrument's digit precision.
    pub fn normalize_price(&self, price: f64) -> f64 {
        round_to(price, self.spec.digits)
    }

    /// Floor a lot quantity to the lot step.
    pub fn normalize_lots(&self, lots: f64) -> f64 {
        floor_to_step(lots, self.spec.lot_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

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
    fn spec_splits_forex_symbol() {
        let spec = InstrumentSpec::new("EURUSD");
        assert_eq!(spec.base_currency, "EUR");
        assert_eq!(spec.quote_currency, "USD");
        let spec = InstrumentSpec::new("US500");
        assert_eq!(spec.quote_currency, "USD");
    }

    #[test]
    fn advance_until_end_then_noop() {
        let mut inst = eurusd(&[1.1, 1.2]);
        assert!(!inst.reached_end());
        assert!(inst.advance());
        assert!(inst.advance());
        assert!(inst.reached_end());
        assert!(!inst.advance());
        assert_eq!(inst.cursor(), 2);
    }

    #[test]
    fn value_at_reads_behind_cursor() {
        let mut inst = eurusd(&[1.1, 1.2, 1.3]);
        inst.advance();
        inst.advance();
        assert_eq!(inst.value_at(PriceField::Close, 0), Some(1.3));
        assert_eq!(inst.value_at(PriceField::Close, 2), Some(1.1));
        assert_eq!(inst.value_at(PriceField::Close, 3), None);
        assert_eq!(inst.value_at(PriceField::Close, -1), None);
        assert_eq!(inst.timestamp_at(1), Some(ts(2)));
    }

    #[test]
    fn value_at_unavailable_past_end() {
        let mut inst = eurusd(&[1.1]);
        inst.advance();
        assert_eq!(inst.value_at(PriceField::Close, 0), None);
        assert_eq!(inst.value_at(PriceField::Close, 1), Some(1.1));
        // Mark price stays on the last tick.
        assert_eq!(inst.bid(), 1.1);
    }

    #[test]
    fn zero_spread_bid_equals_ask() {
        let inst = eurusd(&[1.2]);
        assert_eq!(inst.bid(), 1.2);
        assert_eq!(inst.ask(), 1.2);
    }

    #[test]
    fn fixed_spread_widens_ask() {
        let inst = eurusd(&[1.2]).with_spread(SpreadModel::FixedPips(2.0));
        assert_eq!(inst.bid(), 1.2);
        assert_eq!(inst.ask(), 1.2002);
        assert_eq!(inst.entry_price(Direction::Buy), 1.2002);
        assert_eq!(inst.exit_price(Direction::Buy), 1.2);
    }

    #[test]
    fn shift_positions_cursor() {
        let mut spec = InstrumentSpec::new("EURUSD");
        spec.shift = 2;
        let series: Vec<Quote> = (1..=3).map(|d| Quote::flat(ts(d), 1.0 + d as f64 / 10.0)).collect();
        let inst = Instrument::new(spec.clone(), series.clone()).unwrap();
        assert_eq!(inst.cursor(), 2);
        assert_eq!(inst.value_at(PriceField::Close, 2), Some(1.1));

        spec.shift = 3;
        assert!(matches!(
            Instrument::new(spec, series),
            Err(InstrumentError::ShiftOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_unordered_and_empty_series() {
        let series = vec![Quote::flat(ts(2), 1.0), Quote::flat(ts(2), 1.0)];
        assert_eq!(
            Instrument::new(InstrumentSpec::new("EURUSD"), series).unwrap_err(),
            InstrumentError::Unordered { symbol: "EURUSD".into(), index: 1 }
        );
        assert!(matches!(
            Instrument::new(InstrumentSpec::new("EURUSD"), Vec::<Quote>::new()),
            Err(InstrumentError::EmptySeries { .. })
        ));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let mut spec = InstrumentSpec::new("EURUSD");
        spec.pip_size = 0.0;
        assert!(matches!(
            Instrument::new(spec, vec![Quote::flat(ts(1), 1.0)]),
            Err(InstrumentError::InvalidParameter { name: "pip_size", .. })
        ));
    }

    #[test]
    fn tick_mode_accepts_only_flat_quotes() {
        let mut spec = InstrumentSpec::new("EURUSD");
        spec.mode = SeriesMode::Tick;
        let ticks = vec![Quote::flat(ts(1), 1.2000), Quote::flat(ts(2), 1.2003)];
        let inst = Instrument::new(spec.clone(), ticks).unwrap();
        assert!(inst.is_tick());
        assert!(!inst.is_ohlc());
        assert_eq!(inst.value_at(PriceField::High, 0), inst.value_at(PriceField::Low, 0));

        let candles = vec![Quote::flat(ts(1), 1.2), Quote::new(ts(2), 1.2, 1.21, 1.19, 1.2)];
        assert_eq!(
            Instrument::new(spec, candles.clone()).unwrap_err(),
            InstrumentError::NotTick { symbol: "EURUSD".into(), index: 1 }
        );
        assert!(Instrument::new(InstrumentSpec::new("EURUSD"), candles).unwrap().is_ohlc());
    }

    #[test]
    fn series_is_shared_between_clones() {
        let a = eurusd(&[1.1, 1.2]);
        let mut b = a.clone();
        b.advance();
        assert!(Arc::ptr_eq(a.series(), b.series()));
        assert_eq!(a.cursor(), 0);
        assert_eq!(b.cursor(), 1);
    }
}
