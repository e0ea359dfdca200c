//! The finite, ordered set of dates allocation may write into.

use chrono::NaiveDate;

use super::core::ScheduleError;

/// Candidate allocation dates, sorted and de-duplicated.
///
/// Invariant: never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateHorizon {
    dates: Vec<NaiveDate>,
}

impl DateHorizon {
    /// Build a horizon from an explicit list of dates (any order, duplicates allowed).
    pub fn from_dates(mut dates: Vec<NaiveDate>) -> Result<Self, ScheduleError> {
        dates.sort_unstable();
        dates.dedup();
        if dates.is_empty() {
            return Err(ScheduleError::EmptyHorizon);
        }
        Ok(Self { dates })
    }

    /// Contiguous horizon of `days` days beginning at `start`.
    pub fn spanning(start: NaiveDate, days: u32) -> Result<Self, ScheduleError> {
        let dates: Vec<NaiveDate> = start.iter_days().take(days as usize).collect();
        Self::from_dates(dates)
    }

    pub fn first(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Whether `date` is a working date of this horizon.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    /// The earliest horizon date not before `date`.
    pub fn next_on_or_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        let idx = self.dates.partition_point(|d| *d < date);
        self.dates.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }
}
