//! Yahoo Finance data provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API. Handles request spacing,
//! retries with exponential backoff, response parsing, and the circuit
//! breaker held in the caller's [`LoadContext`].
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. [`CsvProvider`](super::CsvProvider) is the fallback when Yahoo is
//! unavailable.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;

use super::context::LoadContext;
use super::provider::{DataError, DataRequest, DataSource, HistoricalDataProvider};
use crate::domain::{PriceBar, Timeframe};

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Clone)]
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Point the provider at a different host (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Yahoo's name for a timeframe, if it serves that granularity.
    fn interval(timeframe: Timeframe) -> Option<&'static str> {
        match timeframe {
            Timeframe::M1 => Some("1m"),
            Timeframe::M5 => Some("5m"),
            Timeframe::M15 => Some("15m"),
            Timeframe::M30 => Some("30m"),
            Timeframe::H1 => Some("60m"),
            Timeframe::H4 => None,
            Timeframe::D1 => Some("1d"),
            Timeframe::W1 => Some("1wk"),
        }
    }

    fn chart_url(&self, request: &DataRequest, interval: &str) -> String {
        let start_ts = request.window_start().timestamp();
        let end_ts = request.window_end().timestamp() - 1;
        format!(
            "{}/{}?period1={start_ts}&period2={end_ts}&interval={interval}",
            self.base_url,
            request.symbol()
        )
    }

    fn parse_response(
        request: &DataRequest,
        resp: ChartResponse,
    ) -> Result<Vec<PriceBar>, DataError> {
        let symbol = request.symbol();
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| DataError::ResponseFormatChanged("no timestamps".into()))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        // Daily and weekly bars are keyed by date, not by exchange open time.
        let date_keyed = matches!(request.timeframe(), Timeframe::D1 | Timeframe::W1);
        let mut bars = Vec::with_capacity(timestamps.len());
        let mut skipped = 0usize;

        for (i, &ts) in timestamps.iter().enumerate() {
            let mut timestamp = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;
            if date_keyed {
                timestamp = timestamp.date_naive().and_time(NaiveTime::MIN).and_utc();
            }

            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                // Holidays and halted sessions come back as nulls.
                skipped += 1;
                continue;
            };
            let volume = quote.volume.get(i).copied().flatten().unwrap_or(0) as f64;

            bars.push(PriceBar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        if skipped > 0 {
            tracing::warn!(symbol, skipped, "dropped bars with missing prices");
        }
        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    async fn fetch_with_retry(
        &self,
        request: &DataRequest,
        ctx: &LoadContext,
        interval: &str,
    ) -> Result<Vec<PriceBar>, DataError> {
        let breaker = &ctx.circuit_breaker;
        if !breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = self.chart_url(request, interval);
        let symbol = request.symbol();
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                tokio::time::sleep(delay).await;
            }

            if !breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            ctx.rate_limiter.acquire().await;

            let resp = match self.client.get(&url).send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if !status.is_success() {
                breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().await.map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            let bars = Self::parse_response(request, chart)?;
            breaker.record_success();
            return Ok(bars);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

#[async_trait]
impl HistoricalDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn source(&self) -> DataSource {
        DataSource::YahooFinance
    }

    async fn load(
        &self,
        request: &DataRequest,
        ctx: &LoadContext,
    ) -> Result<Vec<PriceBar>, DataError> {
        let interval = Self::interval(request.timeframe())
            .ok_or_else(|| DataError::UnsupportedTimeframe(request.timeframe().to_string()))?;
        let mut bars = self.fetch_with_retry(request, ctx, interval).await?;
        bars.retain(|b| request.contains(b.timestamp));
        if bars.is_empty() {
            return Err(DataError::Empty);
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(timeframe: &str) -> DataRequest {
        DataRequest::new(
            "SPY",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            timeframe,
        )
        .unwrap()
    }

    fn parse(json: &str, timeframe: &str) -> Result<Vec<PriceBar>, DataError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response(&request(timeframe), resp)
    }

    #[test]
    fn parses_daily_chart_and_normalizes_to_midnight() {
        // 2024-01-02 14:30 UTC and 2024-01-03 14:30 UTC
        let json = r#"{"chart":{"result":[{"timestamp":[1704205800,1704292200],
            "indicators":{"quote":[{"open":[470.0,468.0],"high":[472.0,469.5],
            "low":[468.5,466.0],"close":[471.0,467.0],"volume":[1000,null]}]}}],"error":null}}"#;
        let bars = parse(json, "1d").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.time(), NaiveTime::MIN);
        assert_eq!(bars[0].close, 471.0);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn skips_null_rows() {
        let json = r#"{"chart":{"result":[{"timestamp":[1704205800,1704292200],
            "indicators":{"quote":[{"open":[null,468.0],"high":[null,469.5],
            "low":[null,466.0],"close":[null,467.0],"volume":[null,10]}]}}],"error":null}}"#;
        let bars = parse(json, "1h").unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp.timestamp(), 1704292200);
    }

    #[test]
    fn not_found_maps_to_symbol_error() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        assert!(matches!(parse(json, "1d"), Err(DataError::SymbolNotFound { .. })));
    }

    #[test]
    fn other_errors_flag_format_change() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"x"}}}"#;
        assert!(matches!(parse(json, "1d"), Err(DataError::ResponseFormatChanged(_))));
    }

    #[test]
    fn four_hour_bars_are_unsupported() {
        assert_eq!(YahooProvider::interval(Timeframe::H4), None);
        assert_eq!(YahooProvider::interval(Timeframe::W1), Some("1wk"));
    }

    #[tokio::test]
    async fn refuses_when_breaker_open() {
        let provider = YahooProvider::new().unwrap().with_base_url("http://127.0.0.1:9");
        let ctx = LoadContext::default();
        ctx.circuit_breaker.trip();
        let err = provider.load(&request("1d"), &ctx).await.unwrap_err();
        assert!(matches!(err, DataError::CircuitBreakerTripped));
    }

    #[tokio::test]
    async fn four_hour_load_fails_before_any_request() {
        let provider = YahooProvider::new().unwrap().with_base_url("http://127.0.0.1:9");
        let err = provider
            .load(&request("4h"), &LoadContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::UnsupportedTimeframe(ref tf) if tf == "4h"));
    }
}
