use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use stockcast_application::backtesting::run_backtest;
use stockcast_application::config::Config;
use stockcast_application::loader::{HistoricalDataLoader, LoadRequest, LoadSource};
use stockcast_application::optimization::run_optimization;
use stockcast_application::AppError;
use stockcast_domain::entities::metrics::PerformanceMetrics;
use stockcast_domain::repositories::artifacts::ArtifactWriter;
use stockcast_domain::repositories::cache::{CacheStat, PriceCache};
use stockcast_domain::repositories::market_data::{MarketDataProvider, OhlcvQuery};
use stockcast_domain::repositories::RepositoryError;
use stockcast_domain::value_objects::bar::{timestamp_from_date, Bar};
use stockcast_domain::value_objects::equity_point::EquityPoint;
use stockcast_domain::value_objects::interval::Interval;
use stockcast_domain::value_objects::parameters::LeaderboardRow;
use stockcast_domain::value_objects::signal::Signal;
use stockcast_domain::value_objects::trade::Trade;
use stockcast_domain::DomainError;
use stockcast_infrastructure::persistence::CacheManager;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Business-day AAPL-like bars from 2023-08-01 through 2023-12-29.
fn aapl_fixture() -> Vec<Bar> {
    let mut bars = Vec::new();
    let mut day = date(2023, 8, 1);
    let mut prev = 180.0;
    let mut idx = 0usize;
    while day <= date(2023, 12, 29) {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            let i = idx as f64;
            let wobble = ((idx * 7) % 11) as f64 - 5.0;
            let close = 180.0 + 8.0 * (i / 5.0).sin() + 0.05 * i + wobble * 0.3;
            bars.push(Bar {
                symbol: "AAPL".to_string(),
                timestamp: timestamp_from_date(day),
                open: prev,
                high: prev.max(close) + 0.5,
                low: prev.min(close) - 0.5,
                close,
                volume: 50_000_000.0 + (idx % 5) as f64 * 1_000_000.0,
            });
            prev = close;
            idx += 1;
        }
        day = day + Days::new(1);
    }
    bars
}

struct FakeProvider {
    bars: Vec<Bar>,
    fail: bool,
    calls: Cell<usize>,
}

impl FakeProvider {
    fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            fail: false,
            calls: Cell::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            bars: Vec::new(),
            fail: true,
            calls: Cell::new(0),
        }
    }
}

impl MarketDataProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn fetch_ohlcv(&self, query: &OhlcvQuery) -> Result<Vec<Bar>, RepositoryError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(RepositoryError::Unavailable("upstream down".to_string()));
        }
        Ok(self
            .bars
            .iter()
            .filter(|bar| bar.date() >= query.start && bar.date() <= query.end)
            .cloned()
            .collect())
    }
}

struct BrokenCache;

impl PriceCache for BrokenCache {
    fn get(
        &self,
        _symbol: &str,
        _interval: Interval,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Option<Vec<Bar>>, RepositoryError> {
        Err(RepositoryError::Storage("disk on fire".to_string()))
    }

    fn save(&self, _symbol: &str, _interval: Interval, _bars: &[Bar]) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Storage("disk on fire".to_string()))
    }

    fn clear(&self, _symbol: Option<&str>) -> Result<usize, RepositoryError> {
        Ok(0)
    }

    fn stats(&self) -> Result<Vec<CacheStat>, RepositoryError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct RecordingWriter {
    ensured_dirs: RefCell<Vec<PathBuf>>,
    signals_written: RefCell<Option<usize>>,
    trades_written: RefCell<Vec<Trade>>,
    equity_written: RefCell<Vec<EquityPoint>>,
    summary_written: RefCell<Option<(PerformanceMetrics, serde_json::Value)>>,
    leaderboard_written: RefCell<Vec<LeaderboardRow>>,
    json_written: RefCell<Vec<(PathBuf, serde_json::Value)>>,
}

impl ArtifactWriter for RecordingWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), RepositoryError> {
        self.ensured_dirs.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn write_signals_csv(&self, _path: &Path, signals: &[Signal]) -> Result<(), RepositoryError> {
        *self.signals_written.borrow_mut() = Some(signals.len());
        Ok(())
    }

    fn write_trades_csv(&self, _path: &Path, trades: &[Trade]) -> Result<(), RepositoryError> {
        *self.trades_written.borrow_mut() = trades.to_vec();
        Ok(())
    }

    fn write_equity_csv(&self, _path: &Path, points: &[EquityPoint]) -> Result<(), RepositoryError> {
        *self.equity_written.borrow_mut() = points.to_vec();
        Ok(())
    }

    fn write_summary_json(
        &self,
        _path: &Path,
        summary: &PerformanceMetrics,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), RepositoryError> {
        *self.summary_written.borrow_mut() = Some((
            summary.clone(),
            meta.cloned().unwrap_or(serde_json::Value::Null),
        ));
        Ok(())
    }

    fn write_leaderboard_csv(&self, _path: &Path, rows: &[LeaderboardRow]) -> Result<(), RepositoryError> {
        *self.leaderboard_written.borrow_mut() = rows.to_vec();
        Ok(())
    }

    fn write_json(&self, path: &Path, value: &serde_json::Value) -> Result<(), RepositoryError> {
        self.json_written
            .borrow_mut()
            .push((path.to_path_buf(), value.clone()));
        Ok(())
    }
}

fn backtest_config() -> Config {
    toml::from_str(
        r#"
[run]
run_id = "aapl-nov"
symbol = "AAPL"
start = "2023-11-01"
end = "2023-12-01"

[backtest]
frequency = "daily"
lookback_days = 10

[model]
kind = "ensemble"

[trading]
initial_capital = 10000.0
"#,
    )
    .unwrap()
}

fn optimizer_config(method: &str) -> Config {
    toml::from_str(&format!(
        r#"
[run]
run_id = "aapl-opt"
symbol = "AAPL"
start = "2023-09-01"
end = "2023-12-01"

[model]
kind = "trend"

[optimizer]
method = "{method}"
iterations = 6
seed = 11
metric = "total_return"
train_ratio = 0.7
embargo_days = 3
"#
    ))
    .unwrap()
}

fn request() -> LoadRequest {
    LoadRequest {
        symbol: "AAPL".to_string(),
        start: date(2023, 9, 1),
        end: date(2023, 11, 30),
        interval: Interval::OneDay,
    }
}

#[test]
fn loader_caches_provider_data_then_hits() {
    let provider = FakeProvider::new(aapl_fixture());
    let cache = CacheManager::open_in_memory().unwrap();
    let loader = HistoricalDataLoader::new(&provider, Some(&cache));

    let (first, outcome) = loader.load_with_outcome(&request());
    assert_eq!(outcome.source, LoadSource::Provider);
    assert!(!first.is_empty());
    assert_eq!(first.bars.len(), first.indicators.len());

    let (second, outcome) = loader.load_with_outcome(&request());
    assert_eq!(outcome.source, LoadSource::Cache);
    assert_eq!(provider.calls.get(), 1);
    assert_eq!(second.bars, first.bars);
    assert_eq!(second.indicators, first.indicators);
}

#[test]
fn same_day_rows_load_identically_cold_and_warm() {
    let mut bars = aapl_fixture();
    let last_nov = bars
        .iter()
        .find(|bar| bar.date() == date(2023, 11, 30))
        .cloned()
        .unwrap();
    let late_close = last_nov.close + 3.0;
    bars.push(Bar {
        timestamp: last_nov.timestamp + 6 * 3600,
        close: late_close,
        ..last_nov
    });
    let provider = FakeProvider::new(bars);
    let cache = CacheManager::open_in_memory().unwrap();
    let loader = HistoricalDataLoader::new(&provider, Some(&cache));

    let (cold, outcome) = loader.load_with_outcome(&request());
    assert_eq!(outcome.source, LoadSource::Provider);
    let (warm, outcome) = loader.load_with_outcome(&request());
    assert_eq!(outcome.source, LoadSource::Cache);

    assert_eq!(cold.bars, warm.bars);
    assert_eq!(cold.indicators, warm.indicators);
    let nov30: Vec<&Bar> = cold.bars.iter().filter(|bar| bar.date() == date(2023, 11, 30)).collect();
    assert_eq!(nov30.len(), 1);
    assert!((nov30[0].close - late_close).abs() < 1e-9);
}

#[test]
fn refresh_skips_cache_reads() {
    let provider = FakeProvider::new(aapl_fixture());
    let cache = CacheManager::open_in_memory().unwrap();
    HistoricalDataLoader::new(&provider, Some(&cache)).load_price_data(&request());

    let refreshed = HistoricalDataLoader::new(&provider, Some(&cache)).with_refresh(true);
    let (_, outcome) = refreshed.load_with_outcome(&request());
    assert_eq!(outcome.source, LoadSource::Provider);
    assert_eq!(provider.calls.get(), 2);
}

#[test]
fn provider_failure_yields_empty_frame() {
    let provider = FakeProvider::failing();
    let cache = CacheManager::open_in_memory().unwrap();
    let loader = HistoricalDataLoader::new(&provider, Some(&cache));

    let (frame, outcome) = loader.load_with_outcome(&request());
    assert!(frame.is_empty());
    assert_eq!(outcome.source, LoadSource::Unavailable);
    assert!(outcome.error.unwrap().contains("upstream down"));
    assert!(cache.stats().unwrap().is_empty());
}

#[test]
fn broken_cache_falls_through_to_provider() {
    let provider = FakeProvider::new(aapl_fixture());
    let loader = HistoricalDataLoader::new(&provider, Some(&BrokenCache));
    let (frame, outcome) = loader.load_with_outcome(&request());
    assert_eq!(outcome.source, LoadSource::Provider);
    assert!(!frame.is_empty());
}

#[test]
fn backtest_aapl_november_end_to_end() {
    let config = backtest_config();
    config.validate().unwrap();
    let provider = FakeProvider::new(aapl_fixture());
    let loader = HistoricalDataLoader::new(&provider, None);
    let writer = RecordingWriter::default();

    let outcome = run_backtest(&config, Some(PathBuf::from("out")), &loader, &writer).unwrap();
    assert_eq!(outcome.run_dir, PathBuf::from("out").join("aapl-nov"));
    assert_eq!(writer.ensured_dirs.borrow().as_slice(), &[outcome.run_dir.clone()]);

    // 22 business days in November plus 2023-12-01.
    assert_eq!(outcome.run.signals.len(), 23);
    assert_eq!(*writer.signals_written.borrow(), Some(23));
    assert!(outcome
        .run
        .signals
        .iter()
        .all(|s| (0.0..=1.0).contains(&s.confidence)));

    let metrics = &outcome.run.metrics;
    let trades = writer.trades_written.borrow();
    assert_eq!(trades.len(), metrics.total_trades);
    assert_eq!(metrics.bars_processed, 23);

    let equity = writer.equity_written.borrow();
    let last = equity.last().unwrap();
    assert!((metrics.final_equity - (last.cash + last.position_value)).abs() < 1e-6);
    assert!(equity.iter().all(|p| p.cash >= 0.0));

    let commission: f64 = trades.iter().map(|t| t.commission).sum();
    let slippage: f64 = trades.iter().map(|t| t.slippage).sum();
    assert!((metrics.total_commission - commission).abs() < 1e-9);
    assert!((metrics.total_slippage - slippage).abs() < 1e-9);
    assert!(
        (metrics.total_return_pct - (metrics.final_equity / 10_000.0 - 1.0) * 100.0).abs() < 1e-9
    );

    let summary = writer.summary_written.borrow();
    let (summary_metrics, meta) = summary.as_ref().unwrap();
    assert_eq!(summary_metrics, metrics);
    assert_eq!(meta["model"], "ensemble");
    assert_eq!(meta["data_source"], "provider");
    assert_eq!(meta["signals"], 23);
}

#[test]
fn backtest_without_data_is_an_error() {
    let config = backtest_config();
    let provider = FakeProvider::failing();
    let loader = HistoricalDataLoader::new(&provider, None);
    let writer = RecordingWriter::default();

    let err = run_backtest(&config, None, &loader, &writer).unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::InsufficientData(_))));
    assert!(writer.ensured_dirs.borrow().is_empty());
}

#[test]
fn optimizer_split_leaves_embargo_gap() {
    let config = optimizer_config("grid");
    config.validate().unwrap();
    let provider = FakeProvider::new(aapl_fixture());
    let loader = HistoricalDataLoader::new(&provider, None);
    let writer = RecordingWriter::default();

    let (run_dir, report) = run_optimization(&config, None, &loader, &writer).unwrap();
    assert_eq!(run_dir, PathBuf::from("runs").join("aapl-opt"));

    let split = &report.split;
    assert_eq!(split.rows, 66);
    assert_eq!(split.train_rows, 46);
    assert_eq!(split.embargo_rows, 3);
    assert_eq!(split.test_rows, 17);
    assert_eq!(split.train_start, date(2023, 9, 1));
    assert_eq!(split.test_end, date(2023, 12, 1));
    // Three business days sit between the last train row and the first test row.
    let gap: Vec<NaiveDate> = aapl_fixture()
        .iter()
        .map(|bar| bar.date())
        .filter(|d| *d > split.train_end && *d < split.test_start)
        .collect();
    assert_eq!(gap.len(), 3);

    assert_eq!(report.evaluations.len(), 27);
    assert_eq!(writer.leaderboard_written.borrow().len(), 27);
    let json = writer.json_written.borrow();
    assert_eq!(json.len(), 1);
    assert!(json[0].0.ends_with("optimization.json"));
    assert_eq!(json[0].1["evaluated"], 27);
}

#[test]
fn random_search_is_repeatable() {
    let config = optimizer_config("random");
    let provider = FakeProvider::new(aapl_fixture());
    let loader = HistoricalDataLoader::new(&provider, None);

    let first = run_optimization(&config, None, &loader, &RecordingWriter::default())
        .unwrap()
        .1;
    let second = run_optimization(&config, None, &loader, &RecordingWriter::default())
        .unwrap()
        .1;
    assert_eq!(first.evaluations.len(), 6);
    assert_eq!(first.leaderboard(), second.leaderboard());
    assert_eq!(first.out_of_sample, second.out_of_sample);
}
