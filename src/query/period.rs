use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::date_util::{first_day_of_month, iso_week_bounds, last_day_of_month, to_key};
use crate::error::{Error, Result};
use crate::goal::{Goal, Periodicity};

/// A closed interval of calendar dates. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidParameter(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// First through last calendar day of the month containing `day`.
    pub fn month_of(day: NaiveDate) -> Self {
        Self {
            start: first_day_of_month(day),
            end: last_day_of_month(day.year(), day.month()),
        }
    }

    pub fn week_of(day: NaiveDate) -> Self {
        let (start, end) = iso_week_bounds(day);
        Self { start, end }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn start_key(&self) -> String {
        to_key(self.start)
    }

    pub fn end_key(&self) -> String {
        to_key(self.end)
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Which window a computation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowMode {
    Current,
    History,
}

/// Granularity of history rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Day,
    Month,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Day => "day",
            Bucket::Month => "month",
        }
    }
}

/// The goal's own `[start_date, end_date]`, which must be complete and ordered.
fn configured_range(goal: &Goal) -> Result<DateWindow> {
    match (goal.start_date, goal.end_date) {
        (Some(start), Some(end)) => DateWindow::new(start, end),
        _ => Err(Error::InvalidParameter(format!(
            "goal {} has no configured date range",
            goal.id
        ))),
    }
}

/// Resolve the evaluation window for `goal` as of `today`.
pub fn resolve_window(goal: &Goal, mode: WindowMode, today: NaiveDate) -> Result<DateWindow> {
    use Periodicity::*;
    use WindowMode::*;

    match (goal.periodicity, mode) {
        (Daily, Current) => Ok(DateWindow::single_day(today)),
        (Daily, History) => Ok(DateWindow::month_of(today)),
        (Weekly, Current) => Ok(DateWindow::week_of(today)),
        (Monthly, Current) => Ok(DateWindow::month_of(today)),
        (Weekly, History) | (Monthly, History) | (Total, _) => configured_range(goal),
    }
}

pub fn history_bucket(periodicity: Periodicity) -> Bucket {
    match periodicity {
        Periodicity::Monthly => Bucket::Month,
        Periodicity::Daily | Periodicity::Weekly | Periodicity::Total => Bucket::Day,
    }
}
