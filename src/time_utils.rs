// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for time zone offsets and calendar arithmetic.
//!
//! Calendar days are always evaluated in a caller-declared fixed UTC offset.

use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday,
};

use crate::config::MAX_UTC_OFFSET_MINUTES;
use crate::error::AppError;

/// Build a fixed offset from minutes east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, AppError> {
    if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(AppError::Validation(format!(
            "UTC offset {} minutes is out of range",
            minutes
        )));
    }
    FixedOffset::east_opt(minutes * 60)
        .ok_or_else(|| AppError::Validation(format!("Invalid UTC offset: {} minutes", minutes)))
}

/// Minutes east of UTC for an offset.
pub fn offset_minutes(tz: FixedOffset) -> i32 {
    tz.local_minus_utc() / 60
}

/// Calendar day of `ts` in the given time zone.
pub fn local_day(ts: DateTime<Utc>, tz: FixedOffset) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// UTC instant of local midnight starting `day` in the given time zone.
///
/// `None` when that instant falls outside chrono's representable range.
pub fn start_of_day(day: NaiveDate, tz: FixedOffset) -> Option<DateTime<Utc>> {
    let local_midnight = day.and_time(NaiveTime::MIN);
    let utc_naive =
        local_midnight.checked_sub_signed(Duration::seconds(i64::from(tz.local_minus_utc())))?;
    Some(Utc.from_utc_datetime(&utc_naive))
}

/// First day of the week containing `day`, for a week that starts on `anchor`.
pub fn week_start(day: NaiveDate, anchor: Weekday) -> Option<NaiveDate> {
    let back = (7 + day.weekday().num_days_from_monday() - anchor.num_days_from_monday()) % 7;
    day.checked_sub_days(Days::new(u64::from(back)))
}

/// First day of the month containing `day`.
pub fn month_start(day: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(day.year(), day.month(), 1)
}

/// First day of the month following the one containing `day`.
pub fn next_month_start(day: NaiveDate) -> Option<NaiveDate> {
    if day.month() == 12 {
        NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)
    }
}
