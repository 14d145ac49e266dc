use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// UTC calendar date of the bar. Out-of-range timestamps collapse to the epoch.
    pub fn date(&self) -> NaiveDate {
        date_from_timestamp(self.timestamp)
    }
}

pub fn date_from_timestamp(timestamp: i64) -> NaiveDate {
    checked_date_from_timestamp(timestamp).unwrap_or_default()
}

/// `None` when `timestamp` lies outside chrono's representable range.
pub fn checked_date_from_timestamp(timestamp: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

pub fn timestamp_from_date(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}
