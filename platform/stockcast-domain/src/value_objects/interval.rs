use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar interval requested from a market-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1wk")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
}

impl Interval {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "1d" | "1day" | "d" | "daily" => Ok(Interval::OneDay),
            "1wk" | "1w" | "1week" | "weekly" => Ok(Interval::OneWeek),
            "1mo" | "1month" | "monthly" => Ok(Interval::OneMonth),
            _ => Err(format!("unsupported interval: {value}")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneDay => "1d",
            Interval::OneWeek => "1wk",
            Interval::OneMonth => "1mo",
        }
    }

    /// Bars per year, used to annualize returns and Sharpe.
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Interval::OneDay => 252.0,
            Interval::OneWeek => 52.0,
            Interval::OneMonth => 12.0,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cadence of walk-forward steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Earliest date the next step may land on. `None` for daily, which simply
    /// takes the next row.
    pub fn next_min_date(&self, current: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => None,
            Frequency::Weekly => current.checked_add_days(chrono::Days::new(7)),
            Frequency::Monthly => current.checked_add_months(Months::new(1)),
        }
    }
}
