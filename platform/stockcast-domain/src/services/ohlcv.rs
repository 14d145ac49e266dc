use crate::services::calendar::business_days_between;
use crate::value_objects::bar::Bar;
use crate::value_objects::interval::Interval;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub rows_in: usize,
    pub duplicates: usize,
    pub gaps: usize,
    /// Missing bars summed over all gaps.
    pub missing_bars: usize,
    pub out_of_order: usize,
    pub invalid_close: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub first_gap: Option<i64>,
    pub first_duplicate: Option<i64>,
    pub first_out_of_order: Option<i64>,
    pub first_invalid_close: Option<i64>,
}

impl DataQualityReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.out_of_order == 0 && self.invalid_close == 0
    }
}

/// Drops bars with a non-positive or non-finite close, sorts ascending and
/// collapses bars sharing a UTC date keeping the latest one. The date is the
/// cache key, so a fresh fetch and a cache read yield the same rows.
pub fn canonicalize_bars(raw: Vec<Bar>, interval: Interval) -> (Vec<Bar>, DataQualityReport) {
    let mut report = DataQualityReport {
        rows_in: raw.len(),
        ..DataQualityReport::default()
    };

    let mut valid = Vec::with_capacity(raw.len());
    let mut last_seen_ts: Option<i64> = None;
    for bar in raw {
        if !bar.close.is_finite() || bar.close <= 0.0 {
            report.invalid_close += 1;
            if report.first_invalid_close.is_none() {
                report.first_invalid_close = Some(bar.timestamp);
            }
            continue;
        }
        if let Some(prev) = last_seen_ts {
            if bar.timestamp < prev {
                report.out_of_order += 1;
                if report.first_out_of_order.is_none() {
                    report.first_out_of_order = Some(bar.timestamp);
                }
            }
        }
        last_seen_ts = Some(bar.timestamp);
        valid.push(bar);
    }

    // Stable sort keeps input order among equal timestamps, so the last one wins below.
    valid.sort_by_key(|bar| bar.timestamp);

    let mut bars: Vec<Bar> = Vec::with_capacity(valid.len());
    for bar in valid {
        if let Some(last) = bars.last_mut() {
            if bar.date() == last.date() {
                report.duplicates += 1;
                if report.first_duplicate.is_none() {
                    report.first_duplicate = Some(bar.timestamp);
                }
                *last = bar;
                continue;
            }
        }
        bars.push(bar);
    }

    report.first_timestamp = bars.first().map(|b| b.timestamp);
    report.last_timestamp = bars.last().map(|b| b.timestamp);

    for pair in bars.windows(2) {
        let missing = missing_between(interval, pair[0].date(), pair[1].date());
        if missing > 0 {
            report.gaps += 1;
            report.missing_bars += missing;
            if report.first_gap.is_none() {
                report.first_gap = Some(pair[1].timestamp);
            }
        }
    }

    (bars, report)
}

fn missing_between(interval: Interval, prev: NaiveDate, next: NaiveDate) -> usize {
    if next <= prev {
        return 0;
    }
    match interval {
        Interval::OneDay => match (prev.succ_opt(), next.pred_opt()) {
            (Some(from), Some(to)) => business_days_between(from, to),
            _ => 0,
        },
        Interval::OneWeek => {
            let weeks = (next - prev).num_days() / 7;
            weeks.saturating_sub(1) as usize
        }
        Interval::OneMonth => {
            let months = (next.year() - prev.year()) * 12 + next.month() as i32
                - prev.month() as i32;
            months.saturating_sub(1).max(0) as usize
        }
    }
}
