use super::RepositoryError;
use crate::value_objects::bar::Bar;
use crate::value_objects::interval::Interval;
use chrono::NaiveDate;

/// Inclusive date range of bars for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OhlcvQuery {
    pub symbol: String,
    pub interval: Interval,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub trait MarketDataProvider {
    fn name(&self) -> &str;

    /// Raw provider rows; callers canonicalize.
    fn fetch_ohlcv(&self, query: &OhlcvQuery) -> Result<Vec<Bar>, RepositoryError>;
}
