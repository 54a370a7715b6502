//! Criterion grammar shared by search filters
//!
//! A token criterion is one of:
//! - a plain value: `foo`
//! - an inclusive range with optional bounds: `1..5`, `2016..`, `..10`
//! - an array of alternatives: `a,b,c`
//!
//! A backslash escapes `,`, `.` and `\` so they can appear literally.

use crate::{Error, Result};
use chrono::{Duration, NaiveDate};

/// A parsed criterion, generic over the value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion<T = String> {
    Plain(T),
    Range { min: Option<T>, max: Option<T> },
    Array(Vec<T>),
}

impl Criterion<String> {
    /// Parse criterion text. Never fails; typing happens in [`Criterion::try_map`].
    pub fn parse(text: &str) -> Self {
        if let Some(pos) = find_unescaped(text, "..") {
            let min = unescape(&text[..pos]);
            let max = unescape(&text[pos + 2..]);
            return Criterion::Range {
                min: (!min.is_empty()).then_some(min),
                max: (!max.is_empty()).then_some(max),
            };
        }

        let parts = split_unescaped(text, ',');
        if parts.len() > 1 {
            return Criterion::Array(parts.into_iter().map(unescape).collect());
        }

        Criterion::Plain(unescape(text))
    }
}

impl<T> Criterion<T> {
    /// Convert every value of the criterion, failing on the first bad one.
    pub fn try_map<U, F>(self, mut f: F) -> Result<Criterion<U>>
    where
        F: FnMut(T) -> Result<U>,
    {
        Ok(match self {
            Criterion::Plain(v) => Criterion::Plain(f(v)?),
            Criterion::Range { min, max } => Criterion::Range {
                min: min.map(&mut f).transpose()?,
                max: max.map(&mut f).transpose()?,
            },
            Criterion::Array(values) => {
                Criterion::Array(values.into_iter().map(f).collect::<Result<Vec<_>>>()?)
            }
        })
    }
}

impl<T: PartialOrd> Criterion<T> {
    /// Plain: equality. Range: inclusive bounds. Array: any equal.
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Criterion::Plain(v) => v == value,
            Criterion::Range { min, max } => {
                min.as_ref().map_or(true, |m| value >= m)
                    && max.as_ref().map_or(true, |m| value <= m)
            }
            Criterion::Array(values) => values.iter().any(|v| v == value),
        }
    }
}

/// Parse an integer criterion value.
pub fn parse_integer(value: String) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| Error::Search(format!("Invalid number: {:?}.", value)))
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DayRange {
    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.first && day <= self.last
    }
}

/// Parse a date criterion value into the days it covers.
///
/// Accepts `today`, `yesterday`, `YYYY`, `YYYY-MM` and `YYYY-MM-DD`.
pub fn parse_day_range(value: &str, today: NaiveDate) -> Result<DayRange> {
    let invalid = || Error::Search(format!("Invalid date format: {:?}.", value));

    match value {
        "today" => return Ok(DayRange { first: today, last: today }),
        "yesterday" => {
            let day = today - Duration::days(1);
            return Ok(DayRange { first: day, last: day });
        }
        _ => {}
    }

    let parts: Vec<&str> = value.split('-').collect();
    let numbers: Vec<u32> = parts
        .iter()
        .map(|p| {
            if p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()) {
                None
            } else {
                p.parse::<u32>().ok()
            }
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid)?;

    match numbers.as_slice() {
        [year] => {
            let year = i32::try_from(*year).map_err(|_| invalid())?;
            let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
            let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?;
            Ok(DayRange { first, last })
        }
        [year, month] => {
            let year = i32::try_from(*year).map_err(|_| invalid())?;
            let first = NaiveDate::from_ymd_opt(year, *month, 1).ok_or_else(invalid)?;
            let next_month = if *month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)
            }
            .ok_or_else(invalid)?;
            Ok(DayRange {
                first,
                last: next_month - Duration::days(1),
            })
        }
        [year, month, day] => {
            let year = i32::try_from(*year).map_err(|_| invalid())?;
            let date = NaiveDate::from_ymd_opt(year, *month, *day).ok_or_else(invalid)?;
            Ok(DayRange {
                first: date,
                last: date,
            })
        }
        _ => Err(invalid()),
    }
}

/// Match a day against a date criterion.
///
/// A plain value matches any day in its range; a range spans from the first
/// day of `min` to the last day of `max`.
pub fn matches_day(criterion: &Criterion<DayRange>, day: NaiveDate) -> bool {
    match criterion {
        Criterion::Plain(range) => range.contains(day),
        Criterion::Range { min, max } => {
            min.map_or(true, |m| day >= m.first) && max.map_or(true, |m| day <= m.last)
        }
        Criterion::Array(ranges) => ranges.iter().any(|r| r.contains(day)),
    }
}

/// Current day in UTC, used as the reference for `today`/`yesterday`.
pub fn utc_today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn find_unescaped(input: &str, needle: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(needle.as_bytes()) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    let bytes = input.as_bytes();
    while i < bytes.len() {
        match bytes[i] as char {
            '\\' => {
                i += 1;
                if i < bytes.len() {
                    i += 1;
                }
            }
            c if c == sep => {
                out.push(&input[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    out.push(&input[start..]);
    out
}

fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('\\' | ',' | '.')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}
