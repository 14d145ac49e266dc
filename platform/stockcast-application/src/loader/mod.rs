use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;
use stockcast_domain::repositories::cache::PriceCache;
use stockcast_domain::repositories::market_data::{MarketDataProvider, OhlcvQuery};
use stockcast_domain::services::features::MarketFrame;
use stockcast_domain::services::ohlcv::{canonicalize_bars, DataQualityReport};
use stockcast_domain::value_objects::bar::Bar;
use stockcast_domain::value_objects::interval::Interval;
use tracing::info_span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
}

impl LoadRequest {
    fn query(&self) -> OhlcvQuery {
        OhlcvQuery {
            symbol: self.symbol.clone(),
            interval: self.interval,
            start: self.start,
            end: self.end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    Cache,
    Provider,
    /// Provider failed or returned nothing usable.
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadOutcome {
    pub source: LoadSource,
    pub rows: usize,
    pub quality: Option<DataQualityReport>,
    pub error: Option<String>,
}

/// Cache first, then the provider. Never fails: an unusable provider yields an
/// empty frame, so callers must check `MarketFrame::is_empty`.
pub struct HistoricalDataLoader<'a> {
    provider: &'a dyn MarketDataProvider,
    cache: Option<&'a dyn PriceCache>,
    refresh: bool,
}

impl<'a> HistoricalDataLoader<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider, cache: Option<&'a dyn PriceCache>) -> Self {
        Self {
            provider,
            cache,
            refresh: false,
        }
    }

    /// Skip cache reads; fetched data is still written back.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn load_price_data(&self, request: &LoadRequest) -> MarketFrame {
        self.load_with_outcome(request).0
    }

    pub fn load_with_outcome(&self, request: &LoadRequest) -> (MarketFrame, LoadOutcome) {
        let _span = info_span!(
            "load_price_data",
            symbol = %request.symbol,
            interval = request.interval.as_str(),
            start = %request.start,
            end = %request.end
        )
        .entered();
        let started = Instant::now();

        if let Some(frame) = self.read_cache(request) {
            metrics::counter!("stockcast.loader.loads_total", "source" => "cache").increment(1);
            let rows = frame.len();
            return (
                frame,
                LoadOutcome {
                    source: LoadSource::Cache,
                    rows,
                    quality: None,
                    error: None,
                },
            );
        }

        let raw = match self.provider.fetch_ohlcv(&request.query()) {
            Ok(raw) => raw,
            Err(err) => {
                metrics::counter!("stockcast.loader.loads_total", "source" => "unavailable")
                    .increment(1);
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %err,
                    "price fetch failed; returning empty frame"
                );
                return (
                    MarketFrame::empty(request.symbol.clone(), request.interval),
                    LoadOutcome {
                        source: LoadSource::Unavailable,
                        rows: 0,
                        quality: None,
                        error: Some(err.to_string()),
                    },
                );
            }
        };

        let (bars, report) = canonicalize_bars(raw, request.interval);
        if !report.is_clean() {
            tracing::warn!(
                duplicates = report.duplicates,
                out_of_order = report.out_of_order,
                invalid_close = report.invalid_close,
                "provider data needed cleanup"
            );
        }
        tracing::info!(
            provider = self.provider.name(),
            rows = bars.len(),
            gaps = report.gaps,
            missing_bars = report.missing_bars,
            "fetched price data"
        );
        metrics::histogram!("stockcast.loader.fetch_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);

        if bars.is_empty() {
            metrics::counter!("stockcast.loader.loads_total", "source" => "unavailable").increment(1);
            tracing::warn!(provider = self.provider.name(), "provider returned no bars");
            return (
                MarketFrame::empty(request.symbol.clone(), request.interval),
                LoadOutcome {
                    source: LoadSource::Unavailable,
                    rows: 0,
                    quality: Some(report),
                    error: None,
                },
            );
        }

        self.write_cache(request, &bars);
        metrics::counter!("stockcast.loader.loads_total", "source" => "provider").increment(1);
        let rows = bars.len();
        (
            MarketFrame::new(request.symbol.clone(), request.interval, bars),
            LoadOutcome {
                source: LoadSource::Provider,
                rows,
                quality: Some(report),
                error: None,
            },
        )
    }

    fn read_cache(&self, request: &LoadRequest) -> Option<MarketFrame> {
        if self.refresh {
            return None;
        }
        let cache = self.cache?;
        match cache.get(&request.symbol, request.interval, request.start, request.end) {
            Ok(Some(bars)) => {
                tracing::debug!(rows = bars.len(), "cache hit");
                Some(MarketFrame::new(request.symbol.clone(), request.interval, bars))
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "cache read failed; treating as miss");
                None
            }
        }
    }

    fn write_cache(&self, request: &LoadRequest, bars: &[Bar]) {
        let Some(cache) = self.cache else {
            return;
        };
        if let Err(err) = cache.save(&request.symbol, request.interval, bars) {
            tracing::warn!(error = %err, "cache write failed; continuing without cache");
        }
    }
}
