use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::task::RepeatPolicy;

/// Day used when the fired day-of-month does not exist in the target month.
///
/// Deliberately 28 rather than the last day of the month; stored schedules
/// depend on it.
pub const CLAMPED_DAY: u32 = 28;

/// Computes when a task that fired at `fired_at` should fire next.
///
/// `OneTime` never repeats. Day and week steps keep the time of day, month and
/// year steps keep the day of month unless it does not exist in the target
/// month, in which case the day becomes [`CLAMPED_DAY`].
pub fn next_occurrence(fired_at: NaiveDateTime, policy: RepeatPolicy) -> Option<NaiveDateTime> {
    match policy {
        RepeatPolicy::OneTime => None,
        RepeatPolicy::Daily => fired_at.checked_add_signed(Duration::days(1)),
        RepeatPolicy::Weekly => fired_at.checked_add_signed(Duration::weeks(1)),
        RepeatPolicy::Monthly => {
            let date = fired_at.date();
            let (year, month) = if date.month() == 12 {
                (date.year().checked_add(1)?, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            Some(clamped_date(year, month, date.day())?.and_time(fired_at.time()))
        }
        RepeatPolicy::Yearly => {
            let date = fired_at.date();
            let year = date.year().checked_add(1)?;
            Some(clamped_date(year, date.month(), date.day())?.and_time(fired_at.time()))
        }
    }
}

fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if day <= days_in_month(year, month) {
        NaiveDate::from_ymd_opt(year, month, day)
    } else {
        NaiveDate::from_ymd_opt(year, month, CLAMPED_DAY)
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
