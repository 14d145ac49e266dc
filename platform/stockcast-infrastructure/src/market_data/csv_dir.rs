use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use stockcast_domain::repositories::market_data::{MarketDataProvider, OhlcvQuery};
use stockcast_domain::repositories::RepositoryError;
use stockcast_domain::value_objects::bar::{checked_date_from_timestamp, timestamp_from_date, Bar};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct OhlcvRecord {
    pub timestamp_utc: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Reads `{dir}/{SYMBOL}.csv` files for offline runs.
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol.to_uppercase()))
    }
}

impl MarketDataProvider for CsvDirectoryProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_ohlcv(&self, query: &OhlcvQuery) -> Result<Vec<Bar>, RepositoryError> {
        let path = self.path_for(&query.symbol);
        let bars = load_csv(&path, &query.symbol)?;
        let rows_in = bars.len();
        let bars: Vec<Bar> = bars
            .into_iter()
            .filter(|bar| {
                let day = bar.date();
                day >= query.start && day <= query.end
            })
            .collect();
        metrics::counter!("stockcast.provider.requests_total", "provider" => "csv", "result" => "ok")
            .increment(1);
        tracing::debug!(
            path = %path.display(),
            rows_in,
            rows = bars.len(),
            "loaded csv bars"
        );
        Ok(bars)
    }
}

/// Every row of an OHLCV CSV file, in file order.
pub fn load_csv(path: &Path, symbol: &str) -> Result<Vec<Bar>, RepositoryError> {
    let file = File::open(path).map_err(|err| {
        RepositoryError::Unavailable(format!("failed to open OHLCV CSV {}: {err}", path.display()))
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let mut bars = Vec::new();
    for result in reader.deserialize::<OhlcvRecord>() {
        let record = result
            .map_err(|err| RepositoryError::Malformed(format!("failed to parse CSV row: {err}")))?;
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp: parse_timestamp(&record.timestamp_utc)?,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    Ok(bars)
}

fn parse_timestamp(value: &str) -> Result<i64, RepositoryError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive).timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(timestamp_from_date(date));
    }
    if let Ok(secs) = value.parse::<i64>() {
        if checked_date_from_timestamp(secs).is_none() {
            return Err(RepositoryError::Malformed(format!(
                "timestamp out of range: {value}"
            )));
        }
        return Ok(secs);
    }
    Err(RepositoryError::Malformed(format!(
        "unsupported timestamp format: {value}"
    )))
}
