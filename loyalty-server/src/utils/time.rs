//! Business time zone helpers
//!
//! Timestamps are stored as Unix millis; calendar boundaries are evaluated
//! in the configured business time zone.

use chrono::{Datelike, NaiveDate, TimeZone};
use chrono_tz::Tz;

use super::{AppError, AppResult};

/// Parse an IANA zone name (e.g. `America/Chicago`)
pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| AppError::validation(format!("Invalid time zone: {}", name)))
}

/// Local midnight of `date` → Unix millis
///
/// DST gap fallback: a non-existent local time falls back to UTC.
pub fn day_start_millis(date: NaiveDate, tz: Tz) -> i64 {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    naive
        .and_local_timezone(tz)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// Calendar month containing `now_millis`, as a half-open `[start, end)` range
pub fn month_range_millis(now_millis: i64, tz: Tz) -> (i64, i64) {
    let local = tz
        .timestamp_millis_opt(now_millis)
        .single()
        .unwrap_or_else(|| chrono::Utc::now().with_timezone(&tz));
    let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1).unwrap_or(local.date_naive());
    let next = if local.month() == 12 {
        NaiveDate::from_ymd_opt(local.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(local.year(), local.month() + 1, 1)
    }
    .unwrap_or(first);
    (day_start_millis(first, tz), day_start_millis(next, tz))
}
