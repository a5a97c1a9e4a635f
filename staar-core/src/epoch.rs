//! Conversions between calendar dates and seconds since the Unix epoch.
//!
//! Everything here is UTC and integer-valued. The charting API takes its
//! window bounds in whole seconds, so there is no fractional part to round.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Seconds per day; also the daily candlestick period.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// The epoch itself, 1970-01-01.
pub fn epoch_date() -> NaiveDate {
    // chrono's default date is the Unix epoch
    NaiveDate::default()
}

/// Seconds from 1970-01-01T00:00:00 to `at`, reading `at` as UTC.
pub fn epoch_seconds(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp()
}

/// Seconds from the epoch to midnight UTC at the start of `date`.
pub fn date_epoch_seconds(date: NaiveDate) -> i64 {
    epoch_seconds(date.and_time(NaiveTime::MIN))
}

/// Whole days from the epoch to `date` (negative before 1970).
pub fn date_epoch_days(date: NaiveDate) -> i32 {
    (date - epoch_date()).num_days() as i32
}

/// UTC calendar date containing the instant `secs` seconds after the epoch.
pub fn date_from_epoch_seconds(secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc().date())
}
