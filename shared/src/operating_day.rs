//! Operating-day convention for production and dispatch reports
//!
//! An operating day `D` runs from 06:00 local on `D` through 05:59:59.999 local on
//! `D + 1`. Anything stamped before 06:00 belongs to the previous operating day.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Hour (local wall clock) at which an operating day starts
pub const OPERATING_DAY_START_HOUR: u32 = 6;

fn day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(OPERATING_DAY_START_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Time window covered by one operating day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperatingWindow {
    /// First instant of the window (inclusive)
    pub start: NaiveDateTime,
    /// First instant of the next window (exclusive)
    pub end_exclusive: NaiveDateTime,
}

impl OperatingWindow {
    /// Window of the operating day named by `date`
    pub fn for_date(date: NaiveDate) -> Self {
        let start = date.and_time(day_start());
        Self {
            start,
            end_exclusive: start + Duration::days(1),
        }
    }

    /// Last representable instant of the window at millisecond precision
    pub fn end_inclusive(&self) -> NaiveDateTime {
        self.end_exclusive - Duration::milliseconds(1)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at < self.end_exclusive
    }
}

/// Operating day an instant is attributed to
pub fn operating_day_of(at: NaiveDateTime) -> NaiveDate {
    if at.time() < day_start() {
        at.date() - Duration::days(1)
    } else {
        at.date()
    }
}
