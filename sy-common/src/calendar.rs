//! Business calendar: production days and ISO weeks
//!
//! Production output recorded on a weekend is attributed to the
//! preceding Friday's business day (weekend shifts "pack for Friday").
//! Weeks follow ISO-8601: Monday start, week 1 contains the first
//! Thursday of the year.

use crate::{Error, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Map a calendar date to the production day it is attributed to.
///
/// Saturday folds to the preceding Friday, Sunday to the Friday two days
/// prior; every other weekday maps to itself. Pure and total.
pub fn production_date(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}

/// [`production_date`] for a raw event timestamp.
pub fn production_day(ts: NaiveDateTime) -> NaiveDate {
    production_date(ts.date())
}

/// ISO week identifier for a date, formatted `YYYY-Www` (e.g. `2025-W23`).
///
/// Uses the ISO year, which can differ from the calendar year near
/// year boundaries.
pub fn iso_week_id(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

/// Start (Monday) and end (Sunday) dates for an ISO week identifier.
///
/// Inverse of [`iso_week_id`]: for every date `d` in the returned range,
/// `iso_week_id(d)` is the input identifier. Week 1 is anchored on
/// January 4th, which ISO-8601 guarantees falls in week 1.
///
/// Malformed identifiers return [`Error::InvalidArgument`]. Week numbers
/// past the last real week of the year are not range-checked; the
/// arithmetic simply lands in the following year.
pub fn week_range(week_id: &str) -> Result<(NaiveDate, NaiveDate)> {
    let (year_str, week_str) = week_id
        .split_once("-W")
        .ok_or_else(|| Error::InvalidArgument(format!("malformed week id: {week_id:?}")))?;

    let year: i32 = year_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("non-integer year in week id: {week_id:?}")))?;
    let week: u32 = week_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("non-integer week in week id: {week_id:?}")))?;
    if week == 0 {
        return Err(Error::InvalidArgument(format!(
            "week number must be >= 1 in week id: {week_id:?}"
        )));
    }

    let jan4 = NaiveDate::from_ymd_opt(year, 1, 4)
        .ok_or_else(|| Error::InvalidArgument(format!("year out of range in week id: {week_id:?}")))?;
    let week1_monday = jan4 - Duration::days(jan4.weekday().num_days_from_monday() as i64);
    let start = week1_monday + Duration::weeks(week as i64 - 1);
    let end = start + Duration::days(6);

    Ok((start, end))
}

/// Raw-event scan window `[start, end)` covering everything attributed
/// to the given production day.
///
/// Saturday/Sunday inputs are first normalized to the preceding Friday.
/// A Friday window spans three days so that weekend events fold in;
/// Monday through Thursday span a single day.
pub fn daily_fetch_window(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let day = production_date(day);
    let span = if day.weekday() == Weekday::Fri { 3 } else { 1 };
    let start = day.and_time(NaiveTime::MIN);
    (start, start + Duration::days(span))
}
