//! Calendar periods and the date-derived features both regression models use

use chrono::{Datelike, NaiveDate};
use modelvault_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// A calendar month. Deserialization goes through [`Period::new`], so a
/// decoded period always has a month in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

#[derive(Deserialize)]
struct RawPeriod {
    year: i32,
    month: u32,
}

impl TryFrom<RawPeriod> for Period {
    type Error = Error;

    fn try_from(raw: RawPeriod) -> Result<Self> {
        Period::new(raw.year, raw.month)
    }
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!("month {} is out of range", month)));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following month, rolling into January of the next year. `None`
    /// past the last representable year.
    pub fn next(&self) -> Option<Self> {
        if self.month >= 12 {
            self.year.checked_add(1).map(|year| Self { year, month: 1 })
        } else {
            Some(Self { year: self.year, month: self.month + 1 })
        }
    }

    /// Up to `n` consecutive periods starting with `self`.
    pub fn horizon(self, n: usize) -> impl Iterator<Item = Period> {
        std::iter::successors(Some(self), Period::next).take(n)
    }

    #[inline]
    pub fn quarter(&self) -> u32 {
        (self.month.clamp(1, 12) - 1) / 3 + 1
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("expected YYYY-MM, got '{}'", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Period::new(year, month)
    }
}

#[inline]
pub fn month_sin(month: u32) -> f64 {
    (2.0 * PI * f64::from(month) / 12.0).sin()
}

#[inline]
pub fn month_cos(month: u32) -> f64 {
    (2.0 * PI * f64::from(month) / 12.0).cos()
}

/// Season label as the delivery model was trained: Dec-Feb is "winter".
pub fn season_label(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => "winter",
        3..=5 => "spring",
        6..=8 => "summer",
        _ => "fall",
    }
}

/// Southern-hemisphere season index: 0 = Dec-Feb (summer) ... 3 = Sep-Nov.
pub fn southern_season(month: u32) -> u32 {
    match month {
        12 | 1 | 2 => 0,
        3..=5 => 1,
        6..=8 => 2,
        _ => 3,
    }
}
