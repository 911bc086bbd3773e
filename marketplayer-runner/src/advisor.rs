//! Moving-average crossover expert advisor.
//!
//! Goes long when the fast SMA of closes crosses above the slow SMA and short
//! on the opposite cross, closing the opposite side first. Always in the
//! market once the first cross has happened.

use marketplayer_core::domain::{Direction, Instrument, OrderRequest, PriceField};
use marketplayer_core::engine::{EngineError, ExpertAdvisor, Simulator};
use marketplayer_core::sizers::SizingError;

use crate::config::{AdvisorConfig, SizingMode};

/// Simple moving average of closes ending `lag` ticks behind the cursor.
pub fn sma(instrument: &Instrument, period: usize, lag: isize) -> Option<f64> {
    if period == 0 {
        return None;
    }
    let mut sum = 0.0;
    for i in 0..period {
        sum += instrument.value_at(PriceField::Close, lag + i as isize)?;
    }
    Some(sum / period as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cross {
    Up,
    Down,
}

/// Cross of the fast over the slow average between the previous tick and now.
pub fn detect_cross(instrument: &Instrument, fast: usize, slow: usize) -> Option<Cross> {
    let fast_now = sma(instrument, fast, 0)?;
    let slow_now = sma(instrument, slow, 0)?;
    let fast_prev = sma(instrument, fast, 1)?;
    let slow_prev = sma(instrument, slow, 1)?;
    if fast_prev <= slow_prev && fast_now > slow_now {
        Some(Cross::Up)
    } else if fast_prev >= slow_prev && fast_now < slow_now {
        Some(Cross::Down)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct MaCrossAdvisor {
    symbol: String,
    fast: usize,
    slow: usize,
    sizing: SizingMode,
    stop_loss_pips: f64,
    take_profit_pips: f64,
    slippage_pips: u32,
    entries: usize,
    skipped: usize,
    last_cursor: Option<usize>,
}

impl MaCrossAdvisor {
    pub fn new(symbol: impl Into<String>, fast: usize, slow: usize) -> Self {
        let defaults = AdvisorConfig::default();
        Self {
            symbol: symbol.into(),
            fast,
            slow,
            sizing: defaults.sizing,
            stop_loss_pips: defaults.stop_loss_pips,
            take_profit_pips: defaults.take_profit_pips,
            slippage_pips: defaults.slippage_pips,
            entries: 0,
            skipped: 0,
            last_cursor: None,
        }
    }

    pub fn from_config(symbol: impl Into<String>, config: &AdvisorConfig) -> Self {
        Self {
            sizing: config.sizing,
            stop_loss_pips: config.stop_loss_pips,
            take_profit_pips: config.take_profit_pips,
            slippage_pips: config.slippage_pips,
            ..Self::new(symbol, config.fast_period, config.slow_period)
        }
    }

    pub fn with_periods(mut self, fast: usize, slow: usize) -> Self {
        self.fast = fast;
        self.slow = slow;
        self
    }

    pub fn with_sizing(mut self, sizing: SizingMode) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn with_protection(mut self, stop_loss_pips: f64, take_profit_pips: f64) -> Self {
        self.stop_loss_pips = stop_loss_pips;
        self.take_profit_pips = take_profit_pips;
        self
    }

    /// Entries sent to the simulator.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Signals dropped because sizing produced no tradable volume.
    ///
    /// Fraction-based sizes are capped at the largest affordable volume.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn lots(&self, sim: &Simulator) -> Result<f64, SizingError> {
        let symbol = self.symbol.as_str();
        let from_fraction =
            |fraction: Result<f64, SizingError>, fallback: f64| -> Result<f64, SizingError> {
                let lots = fraction.and_then(|f| {
                    let lots = sim.sizing().lots_for_fraction(sim.instrument(symbol)?, f)?;
                    Ok(lots.min(sim.percent(symbol, 1.0)?))
                });
                match lots {
                    Err(SizingError::InsufficientHistory { .. } | SizingError::NoLossObserved) => {
                        Ok(fallback)
                    }
                    other => other,
                }
            };
        match self.sizing {
            SizingMode::FixedLots { lots } => Ok(lots),
            SizingMode::Percent { value } => sim.percent(symbol, value),
            SizingMode::Kelly { fallback_lots } => from_fraction(sim.kelly(symbol), fallback_lots),
            SizingMode::OptimalF { fallback_lots } => {
                from_fraction(sim.optimal_f(symbol), fallback_lots)
            }
            SizingMode::SecureF { fallback_lots } => {
                from_fraction(sim.secure_f(symbol), fallback_lots)
            }
            SizingMode::FractionalF { value, fallback_lots } => {
                from_fraction(sim.fractional_f(symbol, value), fallback_lots)
            }
        }
    }

    fn request(&self, instrument: &Instrument, direction: Direction, lots: f64) -> OrderRequest {
        let entry = instrument.entry_price(direction);
        let sign = direction.sign();
        let mut request = OrderRequest::new(direction, lots).with_slippage(self.slippage_pips);
        if self.stop_loss_pips > 0.0 {
            let level = entry - sign * instrument.pips_to_price(self.stop_loss_pips);
            request = request.with_stop_loss(instrument.normalize_price(level));
        }
        if self.take_profit_pips > 0.0 {
            let level = entry + sign * instrument.pips_to_price(self.take_profit_pips);
            request = request.with_take_profit(instrument.normalize_price(level));
        }
        request
    }
}

impl ExpertAdvisor for MaCrossAdvisor {
    fn tick(&mut self, sim: &mut Simulator) -> Result<(), EngineError> {
        let instrument = sim.instrument(&self.symbol)?;
        // Other instruments' ticks leave this cursor where it was.
        if self.last_cursor == Some(instrument.cursor()) {
            return Ok(());
        }
        self.last_cursor = Some(instrument.cursor());
        let direction = match detect_cross(instrument, self.fast, self.slow) {
            Some(Cross::Up) => Direction::Buy,
            Some(Cross::Down) => Direction::Sell,
            None => return Ok(()),
        };

        let opposite: Vec<_> = sim
            .account()
            .positions_for(&self.symbol)
            .filter(|p| p.direction == direction.opposite())
            .map(|p| p.ticket)
            .collect();
        for ticket in opposite {
            sim.close_position(ticket)?;
        }
        if sim.account().positions_for(&self.symbol).next().is_some() {
            return Ok(());
        }

        let lots = match self.lots(sim) {
            Ok(lots) if lots > 0.0 => lots,
            Ok(_) => {
                self.skipped += 1;
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(symbol = %self.symbol, error = %e, "sizing gave no volume");
                self.skipped += 1;
                return Ok(());
            }
        };
        let request = self.request(sim.instrument(&self.symbol)?, direction, lots);
        sim.send_order(&self.symbol, &request)?;
        self.entries += 1;
        Ok(())
    }
}
