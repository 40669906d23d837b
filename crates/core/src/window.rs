use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive calendar-date filter with optional bounds on either side.
///
/// Bounds are dates, so a timestamp matches when its calendar date does:
/// `to = 2025-03-31` keeps `2025-03-31 23:59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.from, self.to) {
            (None, None) => write!(f, "all dates"),
            (Some(from), None) => write!(f, "from {from}"),
            (None, Some(to)) => write!(f, "until {to}"),
            (Some(from), Some(to)) => write!(f, "{from} to {to}"),
        }
    }
}

impl DateWindow {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        DateWindow { from, to }
    }

    pub fn unbounded() -> Self {
        DateWindow::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        DateWindow {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn is_unbounded(self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// `from > to` can never match anything.
    pub fn is_inverted(self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }

    pub fn contains_date(self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    pub fn contains(self, timestamp: NaiveDateTime) -> bool {
        self.contains_date(timestamp.date())
    }

    /// True when `date` is older than the lower bound.
    pub fn is_before(self, date: NaiveDate) -> bool {
        self.from.is_some_and(|from| date < from)
    }
}
