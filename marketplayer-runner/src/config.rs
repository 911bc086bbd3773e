//! TOML run configuration.
//!
//! A config names the account, the instruments with their quote files and
//! trading parameters, the sample advisor's settings, and run limits:
//!
//! ```toml
//! [account]
//! balance = 10000.0
//! leverage = 100.0
//! currency = "USD"
//!
//! [[instruments]]
//! symbol = "EURUSD"
//! quotes = "eurusd_h1.csv"
//! period = "H1"
//! spread_pips = 1.0
//!
//! [advisor]
//! fast_period = 5
//! slow_period = 20
//!
//! [advisor.sizing]
//! type = "FIXED_LOTS"
//! lots = 0.1
//!
//! [run]
//! max_ticks = 10000
//! liquidation = "close_worst_first"
//! ```
//!
//! Instrument fields left out fall back to `InstrumentSpec::new` defaults.
//! Relative quote paths resolve against the config file's directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use marketplayer_core::domain::order::DEFAULT_SLIPPAGE_PIPS;
use marketplayer_core::domain::{InstrumentSpec, SeriesMode, SpreadModel};
use marketplayer_core::engine::RateTable;
use marketplayer_core::sizers::DEFAULT_MIN_OBSERVATIONS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no instruments configured")]
    NoInstruments,

    #[error("instrument '{0}' configured twice")]
    DuplicateSymbol(String),

    #[error("advisor symbol '{0}' is not a configured instrument")]
    UnknownAdvisorSymbol(String),

    #[error("fast period {fast} must be positive and below slow period {slow}")]
    InvalidPeriods { fast: usize, slow: usize },

    #[error("{field} must be {expected}, got {value}")]
    InvalidValue {
        field: String,
        expected: &'static str,
        value: f64,
    },
}

/// Complete configuration of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub account: AccountConfig,
    pub instruments: Vec<InstrumentConfig>,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub run: RunSettings,
    /// Cross rates for instruments quoted outside the account currency.
    #[serde(default)]
    pub rates: Vec<RateConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub balance: f64,
    #[serde(default = "default_leverage")]
    pub leverage: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_leverage() -> f64 {
    100.0
}

fn default_currency() -> String {
    "USD".to_string()
}

/// One instrument: its quote file plus optional overrides of the forex defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    /// CSV file with `timestamp,open,high,low,close` rows.
    pub quotes: PathBuf,
    pub full_name: Option<String>,
    pub base_currency: Option<String>,
    pub quote_currency: Option<String>,
    pub period: Option<String>,
    pub leverage: Option<f64>,
    pub pip_size: Option<f64>,
    pub digits: Option<u32>,
    pub stop_level: Option<f64>,
    pub freeze_level: Option<f64>,
    pub standard_lot: Option<f64>,
    pub min_lot: Option<f64>,
    pub lot_step: Option<f64>,
    /// Fixed spread added to the ask; 0 or absent means bid = ask = close.
    pub spread_pips: Option<f64>,
    pub shift: Option<usize>,
    /// `OHLC` (default) or `TICK`.
    pub mode: Option<SeriesMode>,
}

impl InstrumentConfig {
    pub fn spec(&self) -> InstrumentSpec {
        let mut spec = InstrumentSpec::new(self.symbol.clone());
        if let Some(v) = &self.full_name {
            spec.full_name = v.clone();
        }
        if let Some(v) = &self.base_currency {
            spec.base_currency = v.clone();
        }
        if let Some(v) = &self.quote_currency {
            spec.quote_currency = v.clone();
        }
        if let Some(v) = &self.period {
            spec.period = v.clone();
        }
        spec.leverage = self.leverage.unwrap_or(spec.leverage);
        spec.pip_size = self.pip_size.unwrap_or(spec.pip_size);
        spec.digits = self.digits.unwrap_or(spec.digits);
        spec.stop_level = self.stop_level.unwrap_or(spec.stop_level);
        spec.freeze_level = self.freeze_level.unwrap_or(spec.freeze_level);
        spec.standard_lot = self.standard_lot.unwrap_or(spec.standard_lot);
        spec.min_lot = self.min_lot.unwrap_or(spec.min_lot);
        spec.lot_step = self.lot_step.unwrap_or(spec.lot_step);
        spec.shift = self.shift.unwrap_or(spec.shift);
        spec.mode = self.mode.unwrap_or(spec.mode);
        spec
    }

    pub fn spread(&self) -> SpreadModel {
        match self.spread_pips {
            Some(pips) if pips > 0.0 => SpreadModel::FixedPips(pips),
            _ => SpreadModel::Zero,
        }
    }
}

/// Settings of the moving-average crossover advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Traded symbol; defaults to the first configured instrument.
    #[serde(default)]
    pub symbol: Option<String>,
    pub fast_period: usize,
    pub slow_period: usize,
    #[serde(default)]
    pub sizing: SizingMode,
    /// Stop-loss distance in pips; 0 places none.
    #[serde(default)]
    pub stop_loss_pips: f64,
    /// Take-profit distance in pips; 0 places none.
    #[serde(default)]
    pub take_profit_pips: f64,
    #[serde(default = "default_slippage")]
    pub slippage_pips: u32,
}

fn default_slippage() -> u32 {
    DEFAULT_SLIPPAGE_PIPS
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            symbol: None,
            fast_period: 10,
            slow_period: 30,
            sizing: SizingMode::default(),
            stop_loss_pips: 0.0,
            take_profit_pips: 0.0,
            slippage_pips: DEFAULT_SLIPPAGE_PIPS,
        }
    }
}

/// How the advisor sizes each entry.
///
/// History-based modes trade `fallback_lots` until enough closed trades exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingMode {
    FixedLots { lots: f64 },
    Percent { value: f64 },
    Kelly { fallback_lots: f64 },
    OptimalF { fallback_lots: f64 },
    SecureF { fallback_lots: f64 },
    FractionalF { value: f64, fallback_lots: f64 },
}

impl Default for SizingMode {
    fn default() -> Self {
        SizingMode::FixedLots { lots: 0.1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationMode {
    #[default]
    None,
    CloseWorstFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Stop after this many ticks even if data remains.
    #[serde(default)]
    pub max_ticks: Option<usize>,
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
    #[serde(default)]
    pub liquidation: LiquidationMode,
}

fn default_min_observations() -> usize {
    DEFAULT_MIN_OBSERVATIONS
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_ticks: None,
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            liquidation: LiquidationMode::None,
        }
    }
}

/// `1 from = rate to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    pub from: String,
    pub to: String,
    pub rate: f64,
}

impl SimulationConfig {
    /// Parse and validate a config from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; relative quote paths become relative to its directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for inst in &mut self.instruments {
            if inst.quotes.is_relative() {
                inst.quotes = base.join(&inst.quotes);
            }
        }
    }

    /// Symbol the advisor trades.
    pub fn advisor_symbol(&self) -> &str {
        match &self.advisor.symbol {
            Some(symbol) => symbol,
            None => self.instruments.first().map_or("", |i| i.symbol.as_str()),
        }
    }

    pub fn rate_table(&self) -> RateTable {
        self.rates
            .iter()
            .fold(RateTable::new(), |table, r| table.with_rate(&r.from, &r.to, r.rate))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("account.balance", self.account.balance)?;
        positive("account.leverage", self.account.leverage)?;

        if self.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        let mut seen = HashSet::new();
        for inst in &self.instruments {
            if !seen.insert(inst.symbol.as_str()) {
                return Err(ConfigError::DuplicateSymbol(inst.symbol.clone()));
            }
            if let Some(pips) = inst.spread_pips {
                non_negative(&format!("{}.spread_pips", inst.symbol), pips)?;
            }
        }
        let symbol = self.advisor_symbol();
        if !seen.contains(symbol) {
            return Err(ConfigError::UnknownAdvisorSymbol(symbol.to_string()));
        }

        validate_periods(self.advisor.fast_period, self.advisor.slow_period)?;
        non_negative("advisor.stop_loss_pips", self.advisor.stop_loss_pips)?;
        non_negative("advisor.take_profit_pips", self.advisor.take_profit_pips)?;
        match self.advisor.sizing {
            SizingMode::FixedLots { lots } => positive("advisor.sizing.lots", lots)?,
            SizingMode::Percent { value } => unit("advisor.sizing.value", value)?,
            SizingMode::Kelly { fallback_lots }
            | SizingMode::OptimalF { fallback_lots }
            | SizingMode::SecureF { fallback_lots } => {
                positive("advisor.sizing.fallback_lots", fallback_lots)?
            }
            SizingMode::FractionalF { value, fallback_lots } => {
                unit("advisor.sizing.value", value)?;
                positive("advisor.sizing.fallback_lots", fallback_lots)?;
            }
        }

        for r in &self.rates {
            positive(&format!("rates.{}{}", r.from, r.to), r.rate)?;
        }
        Ok(())
    }
}

pub fn validate_periods(fast: usize, slow: usize) -> Result<(), ConfigError> {
    if fast == 0 || fast >= slow {
        return Err(ConfigError::InvalidPeriods { fast, slow });
    }
    Ok(())
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        return Ok(());
    }
    Err(ConfigError::InvalidValue { field: field.to_string(), expected: "positive", value })
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        return Ok(());
    }
    Err(ConfigError::InvalidValue { field: field.to_string(), expected: "non-negative", value })
}

fn unit(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue { field: field.to_string(), expected: "within [0, 1]", value })
}
