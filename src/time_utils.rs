// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and calendar windows.
//!
//! Calendar windows are evaluated in UTC.

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// First instant of the calendar month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    first_instant(now.year(), now.month())
}

/// First instant of the calendar month before the one containing `now`.
pub fn previous_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    if now.month() == 1 {
        first_instant(now.year() - 1, 12)
    } else {
        first_instant(now.year(), now.month() - 1)
    }
}

/// First instant of the calendar year containing `now`.
pub fn year_start(now: DateTime<Utc>) -> DateTime<Utc> {
    first_instant(now.year(), 1)
}

fn first_instant(year: i32, month: u32) -> DateTime<Utc> {
    // Day 1 of a month taken from a valid date always exists.
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
