use crate::value_objects::interval::Interval;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Business days (Mon-Fri) in `[start, end]`. Exchange holidays are not
/// modelled, which is why cache completeness tolerates a shortfall.
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> usize {
    if start > end {
        return 0;
    }
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| is_business_day(*day))
        .count()
}

/// Number of bars a complete series for `interval` holds in `[start, end]`.
pub fn expected_bar_count(interval: Interval, start: NaiveDate, end: NaiveDate) -> usize {
    if start > end {
        return 0;
    }
    let business_days = start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| is_business_day(*day));

    match interval {
        Interval::OneDay => business_days.count(),
        Interval::OneWeek => business_days
            .map(|day| {
                let week = day.iso_week();
                (week.year(), week.week())
            })
            .collect::<BTreeSet<_>>()
            .len(),
        Interval::OneMonth => business_days
            .map(|day| (day.year(), day.month()))
            .collect::<BTreeSet<_>>()
            .len(),
    }
}

/// `found / expected`, or 0 when nothing is expected.
pub fn completeness(found: usize, expected: usize) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    found as f64 / expected as f64
}
