//! Date parsing and query construction
//!
//! Granularity is chosen by format: `YYYY-MM-DD` asks for one day and
//! `YYYY-MM` asks for a whole month. Nothing else is accepted.

use std::fmt;

use geotemp_shared::BoundingBox;
use time::{Date, Month};

use super::TemperatureError;

/// Requested time span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpec {
    Day(Date),
    /// Whole calendar month, first and last day inclusive
    Month { first: Date, last: Date },
}

impl DateSpec {
    /// Parse a strict, zero-padded `YYYY-MM-DD` or `YYYY-MM` string
    pub fn parse(raw: &str) -> Result<Self, TemperatureError> {
        let invalid = || TemperatureError::InvalidDateFormat(raw.to_string());
        let bytes = raw.as_bytes();

        let digits_at = |range: std::ops::Range<usize>| {
            bytes
                .get(range)
                .is_some_and(|slice| slice.iter().all(u8::is_ascii_digit))
        };
        let dash_at = |idx: usize| bytes.get(idx) == Some(&b'-');

        let (has_day, ok) = match bytes.len() {
            10 => (
                true,
                digits_at(0..4)
                    && dash_at(4)
                    && digits_at(5..7)
                    && dash_at(7)
                    && digits_at(8..10),
            ),
            7 => (false, digits_at(0..4) && dash_at(4) && digits_at(5..7)),
            _ => (false, false),
        };
        if !ok {
            return Err(invalid());
        }

        // All positions were checked to be ASCII digits above
        let number = |range: std::ops::Range<usize>| {
            raw.get(range).and_then(|s| s.parse::<u16>().ok())
        };

        let year = number(0..4).map(i32::from).ok_or_else(invalid)?;
        let month = number(5..7)
            .and_then(|m| u8::try_from(m).ok())
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(invalid)?;

        if !has_day {
            let last_day = time::util::days_in_year_month(year, month);
            let first = Date::from_calendar_date(year, month, 1)
                .map_err(|_| invalid())?;
            let last = Date::from_calendar_date(year, month, last_day)
                .map_err(|_| invalid())?;
            return Ok(DateSpec::Month { first, last });
        }

        let day = number(8..10)
            .and_then(|d| u8::try_from(d).ok())
            .ok_or_else(invalid)?;
        let date = Date::from_calendar_date(year, month, day)
            .map_err(|_| invalid())?;
        Ok(DateSpec::Day(date))
    }

    /// First and last calendar day covered
    pub fn bounds(&self) -> (Date, Date) {
        match *self {
            DateSpec::Day(date) => (date, date),
            DateSpec::Month { first, last } => (first, last),
        }
    }

    /// STAC datetime interval, `start/end`, whole days in UTC
    pub fn datetime_interval(&self) -> String {
        let (first, last) = self.bounds();
        format!(
            "{}T00:00:00Z/{}T23:59:59Z",
            format_date(first),
            format_date(last)
        )
    }
}

impl fmt::Display for DateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateSpec::Day(date) => f.write_str(&format_date(*date)),
            DateSpec::Month { first, .. } => {
                write!(f, "{:04}-{:02}", first.year(), u8::from(first.month()))
            }
        }
    }
}

fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// One temperature request: a time span over the fixed region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureQuery {
    pub date: DateSpec,
    pub bounding_box: BoundingBox,
}

impl TemperatureQuery {
    pub fn new(date: DateSpec, bounding_box: BoundingBox) -> Self {
        Self { date, bounding_box }
    }
}
