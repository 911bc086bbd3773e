//! CSV quote loading.
//!
//! Files carry a `timestamp,open,high,low,close` header, or `timestamp,price`
//! for tick data (loaded as flat quotes). Timestamps are
//! RFC 3339 (`2024-01-02T10:00:00Z`), `%Y-%m-%d %H:%M:%S`, or a bare
//! `%Y-%m-%d` date. Rows must be strictly ascending in time; anything else
//! is a `LoadError` naming the offending line.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use marketplayer_core::domain::{Quote, QuoteSupplier};
use serde::Deserialize;
use thiserror::Error;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source_name}: {error}")]
    Csv {
        source_name: String,
        #[source]
        error: csv::Error,
    },

    #[error("{source_name} line {line}: unrecognised timestamp '{value}'")]
    BadTimestamp {
        source_name: String,
        line: usize,
        value: String,
    },

    #[error("{source_name} line {line}: duplicate timestamp {timestamp}")]
    Duplicate {
        source_name: String,
        line: usize,
        timestamp: NaiveDateTime,
    },

    #[error("{source_name} line {line}: timestamp {timestamp} is earlier than the previous row")]
    Unordered {
        source_name: String,
        line: usize,
        timestamp: NaiveDateTime,
    },

    #[error("{source_name} line {line}: needs either a price or all of open, high, low, close")]
    MissingPrice { source_name: String, line: usize },

    #[error("{source_name} line {line}: non-finite or non-positive price")]
    InvalidPrice { source_name: String, line: usize },

    #[error("{source_name}: no quotes")]
    Empty { source_name: String },

    #[error("no quote file registered for '{0}'")]
    UnknownSymbol(String),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    #[serde(default)]
    open: Option<f64>,
    #[serde(default)]
    high: Option<f64>,
    #[serde(default)]
    low: Option<f64>,
    #[serde(default)]
    close: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
}

impl CsvRow {
    fn quote(&self, timestamp: NaiveDateTime) -> Option<Quote> {
        match (self.price, self.open, self.high, self.low, self.close) {
            (_, Some(open), Some(high), Some(low), Some(close)) => {
                Some(Quote::new(timestamp, open, high, low, close))
            }
            (Some(price), ..) => Some(Quote::flat(timestamp, price)),
            _ => None,
        }
    }
}

/// Parse a timestamp in any of the accepted formats. RFC 3339 offsets are
/// normalised to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse CSV quotes from any reader. `source_name` labels errors.
pub fn parse_quotes<R: Read>(reader: R, source_name: &str) -> Result<Vec<Quote>, LoadError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut quotes: Vec<Quote> = Vec::new();
    for (i, row) in csv.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = row.map_err(|error| LoadError::Csv {
            source_name: source_name.to_string(),
            error,
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::BadTimestamp {
            source_name: source_name.to_string(),
            line,
            value: row.timestamp.clone(),
        })?;

        if let Some(prev) = quotes.last() {
            if timestamp == prev.timestamp {
                return Err(LoadError::Duplicate {
                    source_name: source_name.to_string(),
                    line,
                    timestamp,
                });
            }
            if timestamp < prev.timestamp {
                return Err(LoadError::Unordered {
                    source_name: source_name.to_string(),
                    line,
                    timestamp,
                });
            }
        }

        let quote = row.quote(timestamp).ok_or_else(|| LoadError::MissingPrice {
            source_name: source_name.to_string(),
            line,
        })?;
        if !quote.is_finite() {
            return Err(LoadError::InvalidPrice {
                source_name: source_name.to_string(),
                line,
            });
        }
        quotes.push(quote);
    }

    if quotes.is_empty() {
        return Err(LoadError::Empty { source_name: source_name.to_string() });
    }
    Ok(quotes)
}

/// Read and validate a quote file.
pub fn read_quotes(path: &Path) -> Result<Vec<Quote>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let quotes = parse_quotes(std::io::BufReader::new(file), &path.display().to_string())?;
    tracing::debug!(path = %path.display(), quotes = quotes.len(), "loaded quotes");
    Ok(quotes)
}

/// `QuoteSupplier` backed by one CSV file per symbol.
///
/// The period argument is informational: each file holds a single period.
#[derive(Debug, Clone, Default)]
pub struct CsvQuoteSupplier {
    files: HashMap<String, PathBuf>,
}

impl CsvQuoteSupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, symbol: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.insert(symbol, path);
        self
    }

    pub fn insert(&mut self, symbol: impl Into<String>, path: impl Into<PathBuf>) {
        self.files.insert(symbol.into(), path.into());
    }
}

impl QuoteSupplier for CsvQuoteSupplier {
    type Error = LoadError;

    fn quotes(&self, symbol: &str, _period: &str) -> Result<Vec<Quote>, LoadError> {
        let path = self
            .files
            .get(symbol)
            .ok_or_else(|| LoadError::UnknownSymbol(symbol.to_string()))?;
        read_quotes(path)
    }
}
