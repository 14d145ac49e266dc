use chrono::Days;
use reqwest::blocking::Client;
use serde::Deserialize;
use stockcast_domain::repositories::market_data::{MarketDataProvider, OhlcvQuery};
use stockcast_domain::repositories::RepositoryError;
use stockcast_domain::value_objects::bar::{checked_date_from_timestamp, timestamp_from_date, Bar};
use std::time::{Duration, Instant};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/120.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Extra attempts after the first, for transport errors and 5xx only.
    pub retries: u32,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 10_000,
            retries: 2,
        }
    }
}

/// Daily/weekly/monthly bars from the public Yahoo Finance chart endpoint.
pub struct YahooChartProvider {
    config: YahooConfig,
    client: Client,
}

impl YahooChartProvider {
    pub fn new(config: YahooConfig) -> Result<Self, RepositoryError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| RepositoryError::Unavailable(format!("failed to build http client: {err}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.config.base_url.trim_end_matches('/'),
            symbol
        )
    }
}

impl MarketDataProvider for YahooChartProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch_ohlcv(&self, query: &OhlcvQuery) -> Result<Vec<Bar>, RepositoryError> {
        let period1 = timestamp_from_date(query.start);
        // period2 is exclusive upstream; push it a day out so `end` is included.
        let period2 = query
            .end
            .checked_add_days(Days::new(1))
            .map(timestamp_from_date)
            .unwrap_or_else(|| timestamp_from_date(query.end));
        let endpoint = self.endpoint(&query.symbol);
        let params = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", query.interval.as_str().to_string()),
            ("events", "history".to_string()),
        ];

        let started = Instant::now();
        let mut attempts = 0u32;
        let mut last_error: Option<RepositoryError> = None;

        while attempts <= self.config.retries {
            attempts += 1;
            match self.client.get(&endpoint).query(&params).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body = resp.text().map_err(|err| {
                            RepositoryError::Unavailable(format!("failed to read chart response: {err}"))
                        })?;
                        metrics::counter!("stockcast.provider.requests_total", "provider" => "yahoo", "result" => "ok")
                            .increment(1);
                        metrics::histogram!("stockcast.provider.request_ms", "provider" => "yahoo")
                            .record(started.elapsed().as_secs_f64() * 1000.0);
                        let bars = parse_chart_response(&query.symbol, &body)?;
                        tracing::debug!(
                            symbol = %query.symbol,
                            interval = query.interval.as_str(),
                            attempts,
                            rows = bars.len(),
                            "fetched chart"
                        );
                        return Ok(bars);
                    }
                    last_error = Some(RepositoryError::Unavailable(format!(
                        "chart request for {} failed: status {}",
                        query.symbol,
                        status.as_u16()
                    )));
                    if status.is_server_error() && attempts <= self.config.retries {
                        tracing::warn!(status = status.as_u16(), attempts, "chart request failed; retrying");
                        continue;
                    }
                    break;
                }
                Err(err) => {
                    last_error = Some(RepositoryError::Unavailable(format!(
                        "chart request for {} failed: {err}",
                        query.symbol
                    )));
                    if attempts <= self.config.retries {
                        tracing::warn!(error = %err, attempts, "chart request failed; retrying");
                        continue;
                    }
                    break;
                }
            }
        }

        metrics::counter!("stockcast.provider.requests_total", "provider" => "yahoo", "result" => "err")
            .increment(1);
        Err(last_error.unwrap_or_else(|| {
            RepositoryError::Unavailable("chart request failed after retries".to_string())
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Turns a chart payload into bars, skipping rows with any missing OHLC value.
pub fn parse_chart_response(symbol: &str, body: &str) -> Result<Vec<Bar>, RepositoryError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|err| RepositoryError::Malformed(format!("invalid chart json: {err}")))?;

    if let Some(error) = envelope.chart.error {
        return Err(RepositoryError::Unavailable(format!(
            "chart error {}: {}",
            error.code.unwrap_or_default(),
            error.description.unwrap_or_default()
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (idx, timestamp) in result.timestamp.iter().copied().enumerate() {
        let at = |series: &[Option<f64>]| series.get(idx).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) =
            (at(&quote.open), at(&quote.high), at(&quote.low), at(&quote.close))
        else {
            continue;
        };
        if checked_date_from_timestamp(timestamp).is_none() {
            return Err(RepositoryError::Malformed(format!(
                "chart timestamp out of range: {timestamp}"
            )));
        }
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume: at(&quote.volume).unwrap_or(0.0),
        });
    }
    Ok(bars)
}
