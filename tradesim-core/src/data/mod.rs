//! Historical data loading.
//!
//! Providers implement [`HistoricalDataProvider`] and return ordered
//! [`PriceBar`](crate::domain::PriceBar) series. Network-facing providers
//! consult the caller-owned [`LoadContext`] before every request.

pub mod circuit_breaker;
pub mod context;
pub mod csv;
pub mod provider;
pub mod synthetic;
pub mod validate;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use context::{LoadContext, RateLimiter};
pub use csv::CsvProvider;
pub use provider::{DataError, DataRequest, DataSource, HistoricalDataProvider};
pub use synthetic::SyntheticProvider;
pub use validate::validate_series;
pub use yahoo::YahooProvider;
