/// Date window parsing for queries and backfill
///
/// Turns `YYYY-MM-DD` arguments into validated calendar boundaries. All
/// boundaries are calendar days in the configured time zone.
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::ValidationError;
use crate::timefmt::{format_date, parse_date};

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl DateWindow {
    /// Parse a start and end argument.
    ///
    /// Both must be valid `YYYY-MM-DD` dates and `start` must not come after `end`.
    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        let start = parse_day(start)?;
        let end = parse_day(end)?;
        Self::new(start, end)
    }

    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::StartAfterEnd { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Whether an instant falls inside the window, i.e. between local midnight
    /// of `start` and the last millisecond of `end` in `tz`.
    pub fn contains_instant(&self, ts: DateTime<Utc>, tz: Tz) -> bool {
        self.contains(ts.with_timezone(&tz).date_naive())
    }

    pub fn label(&self) -> String {
        if self.start == self.end {
            format_date(self.start)
        } else {
            format!("{} to {}", format_date(self.start), format_date(self.end))
        }
    }
}

/// Which days a count covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayScope {
    AllTime,
    Day(NaiveDate),
    Range(DateWindow),
}

impl DayScope {
    /// Scope from zero, one or two date arguments.
    pub fn from_args(args: &[&str]) -> Result<Self, ValidationError> {
        match args {
            [] => Ok(Self::AllTime),
            [day] => Ok(Self::Day(parse_day(day)?)),
            [start, end] => Ok(Self::Range(DateWindow::parse(start, end)?)),
            [_, _, extra, ..] => Err(ValidationError::UnexpectedArgument(extra.to_string())),
        }
    }

    /// Whether a stored date key counts toward this scope.
    ///
    /// Keys that are not valid dates never match a dated scope.
    pub fn matches_key(&self, key: &str) -> bool {
        match self {
            Self::AllTime => true,
            Self::Day(day) => parse_date(key).is_some_and(|d| d == *day),
            Self::Range(window) => parse_date(key).is_some_and(|d| window.contains(d)),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::AllTime => "all time".to_string(),
            Self::Day(day) => format_date(*day),
            Self::Range(window) => window.label(),
        }
    }
}

/// Parse one date argument into a validation error on failure.
pub fn parse_day(s: &str) -> Result<NaiveDate, ValidationError> {
    parse_date(s).ok_or_else(|| ValidationError::InvalidDate(s.trim().to_string()))
}
