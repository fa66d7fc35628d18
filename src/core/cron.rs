//! Cron schedule parsing and matching
//!
//! Supports the classic five-field format (`minute hour day-of-month month
//! day-of-week`) with `*`, values, ranges, steps, lists, and month/weekday
//! names. All evaluation happens in UTC at minute resolution.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a cron expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields in cron expression '{expression}', found {found}")]
    FieldCount { expression: String, found: usize },

    #[error("invalid {field} value '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("{field} value {value} is out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("invalid step '{value}' in {field} field")]
    InvalidStep { field: &'static str, value: String },
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[] };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[] };
const DAY_OF_MONTH: FieldSpec = FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[] };
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &[
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ],
};
// 7 is accepted as an alias for Sunday
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"],
};

impl FieldSpec {
    fn value(&self, text: &str) -> Result<u32, CronError> {
        if let Ok(value) = text.parse::<u32>() {
            if value < self.min || value > self.max {
                return Err(CronError::OutOfRange {
                    field: self.name,
                    value,
                    min: self.min,
                    max: self.max,
                });
            }
            return Ok(value);
        }

        self.names
            .iter()
            .position(|name| name.eq_ignore_ascii_case(text))
            .map(|index| self.min + index as u32)
            .ok_or_else(|| CronError::InvalidField {
                field: self.name,
                value: text.to_string(),
            })
    }
}

/// Allowed values of a single field, stored as a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    bits: u64,
    /// False when the field was written as `*` (or `*/n`)
    restricted: bool,
}

impl FieldSet {
    fn parse(text: &str, spec: &FieldSpec) -> Result<Self, CronError> {
        let mut bits = 0u64;

        for part in text.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step = step
                        .parse::<u32>()
                        .ok()
                        .filter(|s| *s > 0 && *s <= spec.max)
                        .ok_or_else(|| CronError::InvalidStep {
                            field: spec.name,
                            value: part.to_string(),
                        })?;
                    (range, Some(step))
                }
                None => (part, None),
            };

            let (start, end) = if range == "*" {
                (spec.min, spec.max)
            } else if let Some((low, high)) = range.split_once('-') {
                (spec.value(low)?, spec.value(high)?)
            } else {
                let value = spec.value(range)?;
                // `a/n` means "from a to the end, every n"
                if step.is_some() {
                    (value, spec.max)
                } else {
                    (value, value)
                }
            };

            if start > end {
                return Err(CronError::InvalidField {
                    field: spec.name,
                    value: part.to_string(),
                });
            }

            for value in (start..=end).step_by(step.unwrap_or(1) as usize) {
                bits |= 1u64 << value;
            }
        }

        Ok(Self {
            bits,
            restricted: !text.starts_with('*'),
        })
    }

    fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1u64 << value) != 0
    }
}

/// A parsed cron schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
}

/// How far ahead `next_after` searches before giving up
const SEARCH_HORIZON_DAYS: i64 = 366 * 5;

impl CronSchedule {
    /// Parse a five-field cron expression
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount {
                expression: expression.to_string(),
                found: fields.len(),
            });
        }

        let mut days_of_week = FieldSet::parse(fields[4], &DAY_OF_WEEK)?;
        if days_of_week.contains(7) {
            days_of_week.bits |= 1;
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes: FieldSet::parse(fields[0], &MINUTE)?,
            hours: FieldSet::parse(fields[1], &HOUR)?,
            days_of_month: FieldSet::parse(fields[2], &DAY_OF_MONTH)?,
            months: FieldSet::parse(fields[3], &MONTH)?,
            days_of_week,
        })
    }

    /// Check whether the schedule fires at `at` (seconds are ignored)
    pub fn matches(&self, at: &DateTime<Utc>) -> bool {
        self.minutes.contains(at.minute())
            && self.hours.contains(at.hour())
            && self.day_matches(at.date_naive())
    }

    /// Earliest firing minute strictly after `after`
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let horizon = start.date_naive() + Duration::days(SEARCH_HORIZON_DAYS);

        let mut date = start.date_naive();
        let (mut from_hour, mut from_minute) = (start.hour(), start.minute());

        while date <= horizon {
            if self.day_matches(date) {
                for hour in (from_hour..24).filter(|h| self.hours.contains(*h)) {
                    let first_minute = if hour == from_hour { from_minute } else { 0 };
                    if let Some(minute) = (first_minute..60).find(|m| self.minutes.contains(*m)) {
                        let naive = date.and_hms_opt(hour, minute, 0)?;
                        return Some(Utc.from_utc_datetime(&naive));
                    }
                }
            }
            date = date.succ_opt()?;
            from_hour = 0;
            from_minute = 0;
        }

        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        if !self.months.contains(date.month()) {
            return false;
        }

        let dom = self.days_of_month.contains(date.day());
        let dow = self.days_of_week.contains(date.weekday().num_days_from_sunday());

        // Classic cron: when both day fields are restricted, either may match
        if self.days_of_month.restricted && self.days_of_week.restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
