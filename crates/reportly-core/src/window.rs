//! Inclusive calendar-date query windows.

use chrono::{Days, NaiveDate};

use crate::error::ReportError;

/// An inclusive `[start, end]` date range used as a query's date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl QueryWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if end < start {
            return Err(ReportError::InvalidWindow(format!(
                "end date {end} is before start date {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Subtraction that turns a calendar underflow into an error instead of
/// panicking; `days` arrives from the HTTP surface unvalidated.
fn back_days(date: NaiveDate, days: u64) -> Result<NaiveDate, ReportError> {
    date.checked_sub_days(Days::new(days))
        .ok_or_else(|| ReportError::InvalidWindow(format!("window of {days} days is out of range")))
}

/// The current window: the last `days` calendar days ending today,
/// i.e. `[today - days + 1, today]`.
pub fn current_window(today: NaiveDate, days: u32) -> Result<QueryWindow, ReportError> {
    if days == 0 {
        return Err(ReportError::InvalidWindow(
            "window length must be at least 1 day".into(),
        ));
    }
    QueryWindow::new(back_days(today, u64::from(days) - 1)?, today)
}

/// The immediately preceding window of the same length.
///
/// Windows are strictly disjoint and contiguous: the previous window ends
/// the day before the current one starts, `[today - 2*days + 1, today - days]`.
pub fn previous_window(today: NaiveDate, days: u32) -> Result<QueryWindow, ReportError> {
    let current = current_window(today, days)?;
    let end = back_days(current.start, 1)?;
    QueryWindow::new(back_days(end, u64::from(days) - 1)?, end)
}
