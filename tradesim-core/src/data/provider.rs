//! Provider trait, request type and structured data errors.
//!
//! The provider trait abstracts over data sources (synthetic series, CSV
//! files, Yahoo Finance) so loaders can swap implementations and tests can
//! substitute mocks.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::context::LoadContext;
use crate::domain::{PriceBar, Timeframe};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("unsupported timeframe: '{0}'")]
    UnsupportedTimeframe(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("bar series is empty")]
    Empty,

    #[error("bar {index} is not strictly after the previous bar")]
    NonChronological { index: usize },

    #[error("bar {index} is invalid: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("csv error: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Synthetic,
    Csv,
    YahooFinance,
}

/// A validated request for one symbol over an inclusive date range.
///
/// The range covers `start 00:00:00 UTC` up to and including
/// `end 23:59:59 UTC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataRequest {
    symbol: String,
    start: NaiveDate,
    end: NaiveDate,
    timeframe: Timeframe,
}

impl DataRequest {
    /// Parse the timeframe string and validate the range.
    pub fn new(
        symbol: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        timeframe: &str,
    ) -> Result<Self, DataError> {
        Self::with_timeframe(symbol, start, end, timeframe.parse()?)
    }

    pub fn with_timeframe(
        symbol: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        timeframe: Timeframe,
    ) -> Result<Self, DataError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(DataError::InvalidRequest("symbol is empty".into()));
        }
        if start > end || end.checked_add_days(Days::new(1)).is_none() {
            return Err(DataError::InvalidRange { start, end });
        }
        Ok(Self {
            symbol,
            start,
            end,
            timeframe,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// First instant covered by the request.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// First instant after the request (exclusive bound).
    pub fn window_end(&self) -> DateTime<Utc> {
        self.end
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end)
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    /// Whether `ts` falls inside the requested range.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.window_start() && ts < self.window_end()
    }
}

/// Source of historical bars.
///
/// Implementations return bars in strictly increasing timestamp order. The
/// bar count scales with `span / timeframe`: for the same range an hourly
/// request yields more bars than a daily one.
#[async_trait]
pub trait HistoricalDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Which kind of source this provider reads.
    fn source(&self) -> DataSource;

    /// Load the bars for `request`.
    async fn load(
        &self,
        request: &DataRequest,
        ctx: &LoadContext,
    ) -> Result<Vec<PriceBar>, DataError>;
}
