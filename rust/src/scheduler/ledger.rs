//! Per-run capacity ledger: units committed per (group, date).

use chrono::{Days, NaiveDate};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::interner::GroupId;

use super::core::ScheduleError;

/// Tracks committed daily usage for every capacity group in one run.
///
/// Owned by exactly one scheduling run. Usage only ever grows: `commit` adds
/// units and nothing removes them.
#[derive(Clone, Debug)]
pub struct CapacityLedger {
    /// Daily capacity per group, indexed by `GroupId`
    capacities: Vec<u64>,
    /// Committed units per group, indexed by `GroupId`
    used: Vec<FxHashMap<NaiveDate, u64>>,
    /// Sorted list of closed (start, end) periods (inclusive dates)
    /// Invariant: sorted by start, non-overlapping
    closed_periods: Vec<(NaiveDate, NaiveDate)>,
}

impl CapacityLedger {
    /// Create a ledger for groups with the given daily capacities.
    ///
    /// Every group has zero capacity inside `closed_periods`.
    pub fn new(capacities: Vec<u64>, closed_periods: &[(NaiveDate, NaiveDate)]) -> Self {
        let used = vec![FxHashMap::default(); capacities.len()];
        Self {
            capacities,
            used,
            closed_periods: Self::merge_periods(closed_periods.to_vec()),
        }
    }

    /// Merge overlapping or adjacent periods into a sorted, non-overlapping list.
    fn merge_periods(mut periods: Vec<(NaiveDate, NaiveDate)>) -> Vec<(NaiveDate, NaiveDate)> {
        periods.retain(|(start, end)| start <= end);
        periods.sort_by_key(|(start, _)| *start);

        let mut merged: Vec<(NaiveDate, NaiveDate)> = Vec::with_capacity(periods.len());
        for (start, end) in periods {
            if let Some((_, last_end)) = merged.last_mut() {
                // Merge if overlapping or adjacent (within 1 day)
                if start <= last_end.checked_add_days(Days::new(1)).unwrap_or(*last_end) {
                    *last_end = (*last_end).max(end);
                    continue;
                }
            }
            merged.push((start, end));
        }
        merged
    }

    /// Check whether `date` falls in a closed period.
    ///
    /// Uses binary search for O(log n) lookup.
    pub fn is_closed(&self, date: NaiveDate) -> bool {
        let idx = self.closed_periods.partition_point(|(_, end)| *end < date);
        self.closed_periods
            .get(idx)
            .is_some_and(|(start, _)| *start <= date)
    }

    pub fn closed_periods(&self) -> &[(NaiveDate, NaiveDate)] {
        &self.closed_periods
    }

    /// Daily capacity of a group (0 for unknown groups).
    pub fn capacity(&self, group: GroupId) -> u64 {
        self.capacities.get(group as usize).copied().unwrap_or(0)
    }

    /// Units already committed for `group` on `date`.
    pub fn used(&self, group: GroupId, date: NaiveDate) -> u64 {
        self.used
            .get(group as usize)
            .and_then(|days| days.get(&date))
            .copied()
            .unwrap_or(0)
    }

    /// Units still free for `group` on `date`.
    pub fn available(&self, group: GroupId, date: NaiveDate) -> u64 {
        if self.is_closed(date) {
            return 0;
        }
        self.capacity(group).saturating_sub(self.used(group, date))
    }

    /// Commit `quantity` units for `group` on `date`, returning the new usage.
    ///
    /// Fails without changing the ledger if the quantity exceeds what is available.
    pub fn commit(
        &mut self,
        group: GroupId,
        date: NaiveDate,
        quantity: u64,
    ) -> Result<u64, ScheduleError> {
        let available = self.available(group, date);
        if quantity > available {
            return Err(ScheduleError::LedgerOverflow {
                group,
                date,
                requested: quantity,
                available,
            });
        }
        if quantity == 0 {
            return Ok(self.used(group, date));
        }

        // available > 0 implies the group exists
        let days = &mut self.used[group as usize];
        let entry = days.entry(date).or_insert(0);
        *entry += quantity;
        Ok(*entry)
    }

    /// Committed usage of a group, ordered by date.
    pub fn usage(&self, group: GroupId) -> BTreeMap<NaiveDate, u64> {
        self.used
            .get(group as usize)
            .map(|days| days.iter().map(|(d, q)| (*d, *q)).collect())
            .unwrap_or_default()
    }

    pub fn group_count(&self) -> usize {
        self.capacities.len()
    }
}
