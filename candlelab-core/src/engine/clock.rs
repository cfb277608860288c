//! Simulation calendar: tick enumeration, weekend detection, and the
//! market-close normalization of daily ticks.

use crate::domain::Timeframe;
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::America::New_York;

/// Saturday or Sunday in UTC.
pub fn is_weekend(ts_ms: i64) -> bool {
    match DateTime::<Utc>::from_timestamp_millis(ts_ms) {
        Some(dt) => matches!(dt.weekday(), Weekday::Sat | Weekday::Sun),
        None => false,
    }
}

/// 16:00 America/New_York on the given date, as epoch milliseconds.
/// DST-aware; 16:00 never falls inside a transition gap.
pub fn ny_close_ms(date: NaiveDate) -> i64 {
    match New_York.with_ymd_and_hms(date.year(), date.month(), date.day(), 16, 0, 0) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        LocalResult::None => {
            date.and_time(NaiveTime::MIN).and_utc().timestamp_millis() + 21 * 3_600_000
        }
    }
}

/// Enumerate the main timeframe's tick timestamps over `[start_ms, end_ms]`.
///
/// Intraday timeframes step by their granularity from `start_ms`. Daily
/// ticks are one per calendar day, normalized to the New York close.
pub fn ticks(timeframe: Timeframe, start_ms: i64, end_ms: i64) -> Vec<i64> {
    match timeframe {
        Timeframe::D1 => {
            let Some(start) = DateTime::<Utc>::from_timestamp_millis(start_ms) else {
                return Vec::new();
            };
            let Some(end) = DateTime::<Utc>::from_timestamp_millis(end_ms) else {
                return Vec::new();
            };
            let mut out = Vec::new();
            let mut date = start.date_naive();
            let last = end.date_naive();
            while date <= last {
                out.push(ny_close_ms(date));
                date += Duration::days(1);
            }
            out
        }
        _ => {
            let step = timeframe.granularity_ms();
            let mut out = Vec::new();
            let mut ts = start_ms;
            while ts <= end_ms {
                out.push(ts);
                ts += step;
            }
            out
        }
    }
}
