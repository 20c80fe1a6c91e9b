//! Calendar-month buckets shared by every time-series model.

use crate::error::{PipelineError, PipelineResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month. Orders chronologically (year, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year:  i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range: {month}");
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    /// The month immediately after this one.
    pub fn next(self) -> Self {
        self.plus(1)
    }

    pub fn plus(self, months: u32) -> Self {
        let zero_based = self.year as i64 * 12 + (self.month as i64 - 1) + months as i64;
        Self {
            year:  zero_based.div_euclid(12) as i32,
            month: zero_based.rem_euclid(12) as u32 + 1,
        }
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(self, other: MonthKey) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Every month from `start` to `end`, both inclusive. Empty when `end < start`.
    pub fn range_inclusive(start: MonthKey, end: MonthKey) -> Vec<MonthKey> {
        let span = start.months_until(end);
        if span < 0 {
            return Vec::new();
        }
        (0..=span as u32).map(|i| start.plus(i)).collect()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_month(s)
    }
}

/// Parse an ISO date. Timestamps (`2024-03-05T10:00:00Z`) keep only the date part.
pub fn parse_date(value: &str) -> PipelineResult<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| PipelineError::InvalidDate {
        value: value.to_string(),
    })
}

pub fn parse_optional_date(value: Option<&str>) -> PipelineResult<Option<NaiveDate>> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_date(v).map(Some),
        _ => Ok(None),
    }
}

/// Parse `YYYY-MM` (or a full date, keeping its month).
pub fn parse_month(value: &str) -> PipelineResult<MonthKey> {
    let trimmed = value.trim();
    if trimmed.len() == 7 {
        return parse_date(&format!("{trimmed}-01")).map(MonthKey::from_date);
    }
    parse_date(trimmed).map(MonthKey::from_date)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
