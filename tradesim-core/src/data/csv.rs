//! CSV bar files.
//!
//! Looks up `<dir>/<SYMBOL>_<timeframe>.csv` with a header row
//! `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339, a bare
//! `YYYY-MM-DD` date (midnight UTC), or integer epoch seconds. Rows outside
//! the requested window are dropped; ordering is left to
//! [`validate_series`](super::validate_series).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use super::context::LoadContext;
use super::provider::{DataError, DataRequest, DataSource, HistoricalDataProvider};
use crate::domain::{PriceBar, Timeframe};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File that holds `symbol` at `timeframe`.
    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", symbol.to_ascii_uppercase(), timeframe))
    }

    /// Read and filter the file synchronously.
    pub fn read(&self, request: &DataRequest) -> Result<Vec<PriceBar>, DataError> {
        let path = self.path_for(request.symbol(), request.timeframe());
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: request.symbol().to_string(),
            });
        }
        let bars = read_file(&path)?;
        Ok(bars.into_iter().filter(|b| request.contains(b.timestamp)).collect())
    }
}

fn read_file(path: &Path) -> Result<Vec<PriceBar>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))?;

    let mut bars = Vec::new();
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
            DataError::Csv(format!(
                "{}: row {}: unparseable timestamp '{}'",
                path.display(),
                line + 1,
                row.timestamp
            ))
        })?;
        bars.push(PriceBar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[async_trait]
impl HistoricalDataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn source(&self) -> DataSource {
        DataSource::Csv
    }

    async fn load(
        &self,
        request: &DataRequest,
        _ctx: &LoadContext,
    ) -> Result<Vec<PriceBar>, DataError> {
        let provider = self.clone();
        let request = request.clone();
        let bars = tokio::task::spawn_blocking(move || provider.read(&request))
            .await
            .map_err(|e| DataError::Other(format!("csv reader task failed: {e}")))??;
        if bars.is_empty() {
            return Err(DataError::Empty);
        }
        Ok(bars)
    }
}
