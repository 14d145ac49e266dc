use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use stockcast_domain::repositories::cache::{CacheStat, PriceCache};
use stockcast_domain::repositories::RepositoryError;
use stockcast_domain::services::calendar::{completeness, expected_bar_count};
use stockcast_domain::value_objects::bar::Bar;
use stockcast_domain::value_objects::interval::Interval;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Share of expected bars that must be cached before a range counts as a hit.
pub const MIN_COMPLETENESS: f64 = 0.90;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS ohlcv_cache (
    symbol      TEXT    NOT NULL,
    interval    TEXT    NOT NULL,
    trade_date  TEXT    NOT NULL,
    timestamp   INTEGER NOT NULL,
    open        REAL    NOT NULL,
    high        REAL    NOT NULL,
    low         REAL    NOT NULL,
    close       REAL    NOT NULL,
    volume      REAL    NOT NULL,
    fetched_at  INTEGER NOT NULL,
    PRIMARY KEY (symbol, interval, trade_date)
);";

/// SQLite-backed OHLCV cache. Assumes a single writer.
pub struct CacheManager {
    conn: Connection,
}

impl CacheManager {
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                RepositoryError::Storage(format!(
                    "failed to create cache dir {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(|err| {
            RepositoryError::Storage(format!("failed to open cache {}: {err}", path.display()))
        })?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(storage("open in-memory cache"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(SCHEMA).map_err(storage("create cache schema"))?;
        Ok(Self { conn })
    }

    fn load_range(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, RepositoryError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT timestamp, open, high, low, close, volume FROM ohlcv_cache \
                 WHERE symbol = ?1 AND interval = ?2 AND trade_date >= ?3 AND trade_date <= ?4 \
                 ORDER BY trade_date ASC",
            )
            .map_err(storage("prepare cache query"))?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    interval.as_str(),
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok(Bar {
                        symbol: symbol.to_string(),
                        timestamp: row.get(0)?,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )
            .map_err(storage("query cache"))?;

        let bars = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage("read cache row"))?;
        Ok(bars)
    }
}

impl PriceCache for CacheManager {
    fn get(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<Bar>>, RepositoryError> {
        let started = Instant::now();
        let bars = self.load_range(symbol, interval, start, end)?;
        metrics::histogram!("stockcast.cache.get_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        if bars.is_empty() {
            metrics::counter!("stockcast.cache.lookups_total", "result" => "miss", "reason" => "empty")
                .increment(1);
            return Ok(None);
        }

        let expected = expected_bar_count(interval, start, end);
        if expected > 0 {
            let ratio = completeness(bars.len(), expected);
            if ratio < MIN_COMPLETENESS {
                metrics::counter!(
                    "stockcast.cache.lookups_total",
                    "result" => "miss",
                    "reason" => "incomplete"
                )
                .increment(1);
                tracing::debug!(
                    symbol,
                    interval = interval.as_str(),
                    rows = bars.len(),
                    expected,
                    ratio,
                    "cache range incomplete"
                );
                return Ok(None);
            }
        }

        metrics::counter!("stockcast.cache.lookups_total", "result" => "hit").increment(1);
        Ok(Some(bars))
    }

    fn save(&self, symbol: &str, interval: Interval, bars: &[Bar]) -> Result<usize, RepositoryError> {
        if bars.is_empty() {
            return Ok(0);
        }
        let fetched_at = Utc::now().timestamp();
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(storage("begin cache transaction"))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO ohlcv_cache \
                     (symbol, interval, trade_date, timestamp, open, high, low, close, volume, fetched_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                     ON CONFLICT(symbol, interval, trade_date) DO UPDATE SET \
                     timestamp = excluded.timestamp, open = excluded.open, high = excluded.high, \
                     low = excluded.low, close = excluded.close, volume = excluded.volume, \
                     fetched_at = excluded.fetched_at",
                )
                .map_err(storage("prepare cache upsert"))?;
            for bar in bars {
                stmt.execute(params![
                    symbol,
                    interval.as_str(),
                    bar.date().format(DATE_FORMAT).to_string(),
                    bar.timestamp,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    fetched_at
                ])
                .map_err(storage("upsert cache row"))?;
            }
        }
        tx.commit().map_err(storage("commit cache transaction"))?;

        metrics::counter!("stockcast.cache.rows_written_total").increment(bars.len() as u64);
        tracing::debug!(symbol, interval = interval.as_str(), rows = bars.len(), "cache updated");
        Ok(bars.len())
    }

    fn clear(&self, symbol: Option<&str>) -> Result<usize, RepositoryError> {
        let removed = match symbol {
            Some(symbol) => self
                .conn
                .execute("DELETE FROM ohlcv_cache WHERE symbol = ?1", params![symbol]),
            None => self.conn.execute("DELETE FROM ohlcv_cache", []),
        }
        .map_err(storage("clear cache"))?;
        Ok(removed)
    }

    fn stats(&self) -> Result<Vec<CacheStat>, RepositoryError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT symbol, interval, COUNT(*), MIN(trade_date), MAX(trade_date) \
                 FROM ohlcv_cache GROUP BY symbol, interval ORDER BY symbol, interval",
            )
            .map_err(storage("prepare cache stats"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })
            .map_err(storage("query cache stats"))?;

        let mut stats = Vec::new();
        for row in rows {
            let (symbol, interval, count, first, last) = row.map_err(storage("read cache stats"))?;
            stats.push(CacheStat {
                symbol,
                interval,
                rows: count.max(0) as usize,
                first_date: first.as_deref().map(parse_date).transpose()?,
                last_date: last.as_deref().map(parse_date).transpose()?,
            });
        }
        Ok(stats)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|err| RepositoryError::Malformed(format!("bad cached trade_date {value}: {err}")))
}

fn storage(stage: &'static str) -> impl Fn(rusqlite::Error) -> RepositoryError {
    move |err| {
        metrics::counter!("stockcast.cache.errors_total", "stage" => stage).increment(1);
        RepositoryError::Storage(format!("failed to {stage}: {err}"))
    }
}
