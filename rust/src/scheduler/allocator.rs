//! Greedy day-by-day capacity allocation.
//!
//! Orders are processed by ascending resolved start date (ties keep input
//! order). Each order walks a day cursor from its start and takes whatever its
//! group still has free on each working day until its quantity is covered or
//! the horizon runs out. Earlier-starting orders therefore win contested
//! capacity; nothing is ever reassigned.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::Order;
use crate::{log_changes, log_checks, log_debug};

use super::core::ScheduleError;
use super::horizon::DateHorizon;
use super::ledger::CapacityLedger;

/// Quantities assigned to one order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Units per date; only dates that received units appear
    pub daily: BTreeMap<NaiveDate, u64>,
    pub total_assigned: u64,
}

impl Allocation {
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.daily.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.daily.keys().next_back().copied()
    }
}

/// Indices of schedulable orders in processing order.
///
/// Orders without a start date are left out. The sort is stable, so orders
/// with equal start dates keep their input order.
pub fn processing_order(starts: &[Option<NaiveDate>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..starts.len()).filter(|&i| starts[i].is_some()).collect();
    order.sort_by_key(|&i| starts[i]);
    order
}

/// Assigns order quantities into a shared ledger over a fixed horizon.
pub struct CapacityAllocator<'a> {
    horizon: &'a DateHorizon,
    verbosity: u8,
}

impl<'a> CapacityAllocator<'a> {
    pub fn new(horizon: &'a DateHorizon, verbosity: u8) -> Self {
        Self { horizon, verbosity }
    }

    /// Allocate a single order starting no earlier than `start`.
    ///
    /// Stops early, leaving the order under-allocated, once no horizon date
    /// remains. Dates not in the horizon are skipped.
    pub fn allocate_order(
        &self,
        order: &Order,
        start: NaiveDate,
        ledger: &mut CapacityLedger,
    ) -> Result<Allocation, ScheduleError> {
        let verbosity = self.verbosity;
        let mut allocation = Allocation::default();
        let mut remaining = order.required_quantity;
        let mut cursor = start;

        log_checks!(
            verbosity,
            "Order {}: need {} from {} (group {})",
            order.order_id,
            remaining,
            start,
            order.group
        );

        // Dates outside the horizon are passed over
        while remaining > 0 {
            let Some(day) = self.horizon.next_on_or_after(cursor) else {
                break;
            };
            if day > cursor {
                log_debug!(verbosity, "  {}: next horizon date {}", cursor, day);
            }

            let available = ledger.available(order.group, day);
            if available > 0 {
                let assign = available.min(remaining);
                let used = ledger.commit(order.group, day, assign)?;
                allocation.daily.insert(day, assign);
                allocation.total_assigned += assign;
                remaining -= assign;
                log_changes!(
                    verbosity,
                    "  Order {}: {} units on {} (group usage {}/{})",
                    order.order_id,
                    assign,
                    day,
                    used,
                    ledger.capacity(order.group)
                );
            } else {
                log_checks!(verbosity, "  {}: no capacity left", day);
            }

            cursor = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        if remaining > 0 {
            log_changes!(
                verbosity,
                "  Order {}: horizon exhausted, {} of {} units unassigned",
                order.order_id,
                remaining,
                order.required_quantity
            );
        }

        Ok(allocation)
    }

    /// Allocate every schedulable order.
    ///
    /// `starts[i]` is the resolved start of `orders[i]`. Returns one entry per
    /// order, in input order; unschedulable orders get `None`.
    pub fn allocate(
        &self,
        orders: &[Order],
        starts: &[Option<NaiveDate>],
        ledger: &mut CapacityLedger,
    ) -> Result<Vec<Option<Allocation>>, ScheduleError> {
        let mut allocations: Vec<Option<Allocation>> = vec![None; orders.len()];

        for idx in processing_order(starts) {
            let (Some(order), Some(Some(start))) = (orders.get(idx), starts.get(idx)) else {
                continue;
            };
            allocations[idx] = Some(self.allocate_order(order, *start, ledger)?);
        }

        Ok(allocations)
    }
}
