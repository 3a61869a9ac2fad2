//! Year and date range handling for annual raster products.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{LandcoverError, LandcoverResult};

/// An inclusive calendar-date period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> LandcoverResult<Self> {
        if start > end {
            return Err(LandcoverError::config(format!(
                "date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// January 1st through December 31st of `year`.
    pub fn for_year(year: i32) -> LandcoverResult<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| LandcoverError::config(format!("year {} out of range", year)))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| LandcoverError::config(format!("year {} out of range", year)))?;
        Ok(Self { start, end })
    }

    /// Parse "YYYY-MM-DD/YYYY-MM-DD".
    pub fn parse(s: &str) -> LandcoverResult<Self> {
        let (start, end) = s
            .split_once('/')
            .ok_or_else(|| LandcoverError::config(format!("invalid date range: {}", s)))?;
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        date >= &self.start && date <= &self.end
    }

    /// Overlap of two ranges, `None` when disjoint.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(DateRange { start, end })
    }
}

fn parse_date(s: &str) -> LandcoverResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| LandcoverError::config(format!("invalid date '{}': {}", s, e)))
}

/// An inclusive range of calendar years, e.g. 2001..=2019.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> LandcoverResult<Self> {
        if start > end {
            return Err(LandcoverError::config(format!(
                "start year {} is after end year {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Years in ascending order.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }

    /// The whole span as a date range (Jan 1 of start through Dec 31 of end).
    pub fn date_range(&self) -> LandcoverResult<DateRange> {
        let first = DateRange::for_year(self.start)?;
        let last = DateRange::for_year(self.end)?;
        DateRange::new(first.start, last.end)
    }
}

/// Calendar year of an acquisition date.
pub fn year_of(date: &NaiveDate) -> i32 {
    date.year()
}
