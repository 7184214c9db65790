//! Simulation calendar.
//!
//! The simulation counts whole days. A [`Date`] is the number of days since
//! 1 January of year 0 (proleptic Gregorian). Shifting the clock back can
//! push stamps before that day; they stay valid. All freshness stamps on hubs
//! and edges and every join deadline are dates, and they are compared against
//! the simulation clock after a snapshot is restored, so they serialize as
//! the raw day number.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Days between 0000-01-01 and 0001-01-01 (year 0 is a leap year).
const DAYS_TILL_CE: i32 = 366;

/// A simulation day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(i32);

impl Date {
    /// Marks a stamp that was never set.
    pub const INVALID: Self = Self(i32::MIN);

    /// First day of the calendar.
    pub const ZERO: Self = Self(0);

    /// Creates a date from a raw day number.
    #[must_use]
    pub const fn from_days(days: i32) -> Self {
        Self(days)
    }

    /// Creates a date from a calendar day.
    ///
    /// Returns `None` for days chrono cannot represent or that lie before
    /// year 0.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let days = date.num_days_from_ce() - 1 + DAYS_TILL_CE;
        (days >= 0).then_some(Self(days))
    }

    /// Raw day number.
    #[must_use]
    pub const fn days(self) -> i32 {
        self.0
    }

    /// Returns true unless this is [`Date::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Calendar representation, if the date is valid.
    #[must_use]
    pub fn to_calendar(self) -> Option<NaiveDate> {
        if !self.is_valid() {
            return None;
        }
        NaiveDate::from_num_days_from_ce_opt(self.0.checked_sub(DAYS_TILL_CE - 1)?)
    }

    /// Midpoint between two dates, rounded towards zero.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        let mid = (i64::from(self.0) + i64::from(other.0)) / 2;
        Self(i32::try_from(mid).unwrap_or(i32::MAX))
    }

    /// Shifts the date by `interval` days, leaving invalid dates untouched.
    #[must_use]
    pub fn shifted(self, interval: i32) -> Self {
        if self.is_valid() {
            self + interval
        } else {
            self
        }
    }
}

impl Add<i32> for Date {
    type Output = Self;

    fn add(self, days: i32) -> Self {
        if !self.is_valid() {
            return self;
        }
        // Saturating arithmetic must never produce the sentinel.
        Self(self.0.saturating_add(days).max(Self::INVALID.0 + 1))
    }
}

impl AddAssign<i32> for Date {
    fn add_assign(&mut self, days: i32) {
        *self = *self + days;
    }
}

impl Sub for Date {
    type Output = i32;

    fn sub(self, other: Self) -> i32 {
        self.0.saturating_sub(other.0)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_calendar() {
            Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            None if self.is_valid() => write!(f, "day {}", self.0),
            None => f.write_str("never"),
        }
    }
}
