use super::RepositoryError;
use crate::value_objects::bar::Bar;
use crate::value_objects::interval::Interval;
use chrono::NaiveDate;
use serde::Serialize;

/// Cached rows for one symbol/interval pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStat {
    pub symbol: String,
    pub interval: String,
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

pub trait PriceCache {
    /// `Ok(None)` is a miss: nothing stored, or too few rows to cover the range.
    fn get(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<Bar>>, RepositoryError>;

    /// Upserts `bars`, returning the number of rows written.
    fn save(&self, symbol: &str, interval: Interval, bars: &[Bar]) -> Result<usize, RepositoryError>;

    /// Removes cached rows for `symbol`, or every row when `None`.
    fn clear(&self, symbol: Option<&str>) -> Result<usize, RepositoryError>;

    fn stats(&self) -> Result<Vec<CacheStat>, RepositoryError>;
}
