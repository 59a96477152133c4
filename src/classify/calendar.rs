//! Weekday trading calendar for ETF flow windows

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::domain::{DatedSeries, DatedValue};

pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Most recent trading day on or before `date`
pub fn latest_trading_day(date: NaiveDate) -> NaiveDate {
    let mut day = date;
    while !is_trading_day(day) {
        day -= Duration::days(1);
    }
    day
}

/// Trailing trading days ending at the latest trading day on or before
/// `as_of`, most recent first, each paired with the series value (or missing).
///
/// Weekend observations in the series are never consulted. The walk stops at
/// the series' first observation, so a short history produces fewer than
/// `window` points.
pub fn trading_day_window(
    series: &DatedSeries,
    as_of: NaiveDate,
    window: usize,
) -> Vec<DatedValue> {
    let Some(earliest) = series.earliest() else {
        return Vec::new();
    };

    let mut points = Vec::with_capacity(window);
    let mut day = latest_trading_day(as_of);
    while points.len() < window && day >= earliest {
        if is_trading_day(day) {
            points.push(DatedValue::new(day, series.value_on(day)));
        }
        day -= Duration::days(1);
    }
    points
}
