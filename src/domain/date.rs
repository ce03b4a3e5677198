//! Calendar dates
//!
//! A plain year/month/day value used for deadlines, creation and completion
//! dates. The text form is `MM-DD-YYYY`; unpadded components are accepted
//! when parsing (`3-5-2025`).

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use chrono::{Datelike, Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("Invalid date: {month}-{day}-{year}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("Invalid date format: expected 'MM-DD-YYYY', got '{0}'")]
    Format(String),
}

/// An immutable Gregorian calendar date
///
/// Ordering is by `(year, month, day)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Date(NaiveDate);

impl Date {
    /// Creates a date, rejecting days that do not exist in the calendar
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or(DateError::InvalidDate { year, month, day })
    }

    /// Today's date according to the local clock
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Returns true if `year` is a Gregorian leap year
    pub fn is_leap_year(year: i32) -> bool {
        year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
    }

    /// Shifts the date by a signed number of days
    ///
    /// Saturates at the representable range instead of panicking.
    pub fn add_days(self, days: i64) -> Self {
        let shifted = if days >= 0 {
            self.0.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            self.0.checked_sub_days(Days::new(days.unsigned_abs()))
        };

        match shifted {
            Some(date) => Self(date),
            None if days >= 0 => Self(NaiveDate::MAX),
            None => Self(NaiveDate::MIN),
        }
    }

    /// Number of days from `other` to `self` (negative if `self` is earlier)
    pub fn days_since(self, other: Date) -> i64 {
        self.0.signed_duration_since(other.0).num_days()
    }
}

impl Add<i64> for Date {
    type Output = Date;

    fn add(self, days: i64) -> Date {
        self.add_days(days)
    }
}

impl Sub<i64> for Date {
    type Output = Date;

    fn sub(self, days: i64) -> Date {
        self.add_days(days.saturating_neg())
    }
}

impl Sub<Date> for Date {
    type Output = i64;

    fn sub(self, other: Date) -> i64 {
        self.days_since(other)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}-{:04}", self.month(), self.day(), self.year())
    }
}

impl FromStr for Date {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 {
            return Err(DateError::Format(s.to_string()));
        }

        let month: u32 = parts[0]
            .parse()
            .map_err(|_| DateError::Format(s.to_string()))?;
        let day: u32 = parts[1]
            .parse()
            .map_err(|_| DateError::Format(s.to_string()))?;
        let year: i32 = parts[2]
            .parse()
            .map_err(|_| DateError::Format(s.to_string()))?;

        Self::new(year, month, day)
    }
}

impl TryFrom<String> for Date {
    type Error = DateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Date> for String {
    fn from(date: Date) -> Self {
        date.to_string()
    }
}
