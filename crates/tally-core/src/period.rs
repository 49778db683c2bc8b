//! # Period Codes
//!
//! Two calendar keys drive the ledger:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  document date 2025-01-17                                               │
//! │       │                                                                 │
//! │       ├──► PeriodCode  "2025-01"   accounting period (per warehouse)   │
//! │       │        starts_at 2025-01-01T00:00:00.000Z                       │
//! │       │        ends_at   2025-01-31T23:59:59.999Z                       │
//! │       │                                                                 │
//! │       └──► YearMonth   "2501"      sequence scope (per document type)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Period codes sort chronologically both as values and as strings, which is
//! what the balance lookup ("nearest earlier period") relies on.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// =============================================================================
// Period Code
// =============================================================================

/// A calendar-month accounting period, rendered as `YYYY-MM`.
///
/// Internally the first day of the month; ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PeriodCode(NaiveDate);

impl PeriodCode {
    /// Builds a period code from a year and a 1-based month.
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            });
        }
        if !(1000..=9999).contains(&year) {
            return Err(ValidationError::OutOfRange {
                field: "year".to_string(),
                min: 1000,
                max: 9999,
            });
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(PeriodCode)
            .ok_or_else(|| ValidationError::invalid_format("period_code", "no such month"))
    }

    /// The period a calendar date falls into.
    pub fn from_date(date: NaiveDate) -> Self {
        PeriodCode(date.with_day(1).unwrap_or(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// The succeeding calendar month, `None` past the end of the calendar.
    pub fn next(&self) -> Option<PeriodCode> {
        self.0.checked_add_months(Months::new(1)).map(PeriodCode)
    }

    /// The preceding calendar month.
    pub fn previous(&self) -> Option<PeriodCode> {
        self.0.checked_sub_months(Months::new(1)).map(PeriodCode)
    }

    /// First instant of the month (UTC).
    pub fn starts_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0.and_time(NaiveTime::MIN))
    }

    /// Last instant of the month (UTC), millisecond precision.
    pub fn ends_at(&self) -> DateTime<Utc> {
        match self.next() {
            Some(next) => next.starts_at() - Duration::milliseconds(1),
            None => DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Whether `date` falls inside this period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        PeriodCode::from_date(date) == *self
    }
}

impl fmt::Display for PeriodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for PeriodCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::invalid_format("period_code", "expected YYYY-MM");

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        if !year.chars().chain(month.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        PeriodCode::new(year, month)
    }
}

impl From<PeriodCode> for String {
    fn from(code: PeriodCode) -> String {
        code.to_string()
    }
}

impl TryFrom<String> for PeriodCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Year-Month (sequence scope)
// =============================================================================

/// Two-digit year plus two-digit month, the `YYMM` segment of a document
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct YearMonth {
    year: u32,
    month: u32,
}

impl YearMonth {
    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year().rem_euclid(100) as u32,
            month: date.month(),
        }
    }

    /// Two-digit year (`25` for 2025).
    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::invalid_format("year_month", "expected YYMM");

        if s.len() != 4 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: u32 = s[..2].parse().map_err(|_| invalid())?;
        let month: u32 = s[2..].parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(YearMonth { year, month })
    }
}

impl From<YearMonth> for String {
    fn from(ym: YearMonth) -> String {
        ym.to_string()
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
