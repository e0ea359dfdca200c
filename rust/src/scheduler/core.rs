//! Scheduling run: validation, start date resolution and allocation.

use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::{SchedulingConfig, MAX_HORIZON_DAYS};
use crate::interner::GroupId;
use crate::models::{AllocationResult, GroupUsage, OrderRecord, ScheduleResult};
use crate::start_date::{resolve_all, Resolution, StartDatePolicy};
use crate::validation::{validate_orders, ValidatedOrders, ValidationError};
use crate::{log_changes, log_checks};

use super::allocator::CapacityAllocator;
use super::horizon::DateHorizon;
use super::ledger::CapacityLedger;

/// Errors that abort a scheduling run.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Date horizon is empty")]
    EmptyHorizon,
    #[error("Capacity exceeded for group {group} on {date}: requested {requested}, available {available}")]
    LedgerOverflow {
        group: GroupId,
        date: NaiveDate,
        requested: u64,
        available: u64,
    },
}

/// Greedy, capacity-constrained scheduler for packaging orders.
///
/// Each call to [`PackagingScheduler::schedule`] builds its own ledger, so one
/// scheduler can be run repeatedly and separate schedulers never share state.
pub struct PackagingScheduler {
    records: Vec<OrderRecord>,
    config: SchedulingConfig,
    policy: StartDatePolicy,
    /// Explicit horizon; generated from the earliest start when absent
    horizon: Option<DateHorizon>,
}

impl PackagingScheduler {
    /// Create a new scheduler.
    ///
    /// Configuration problems (unknown policy, zero-length or oversized
    /// horizon, inverted closed periods, empty explicit horizon) are rejected here.
    pub fn new(
        records: Vec<OrderRecord>,
        config: SchedulingConfig,
        horizon_dates: Option<Vec<NaiveDate>>,
    ) -> Result<Self, ScheduleError> {
        let policy = config.policy().map_err(|name| {
            ScheduleError::InvalidConfig(format!("unknown start date policy: {}", name))
        })?;

        if horizon_dates.is_none() && config.horizon_days == 0 {
            return Err(ScheduleError::InvalidConfig(
                "horizon_days must be at least 1".to_string(),
            ));
        }
        if horizon_dates.is_none() && config.horizon_days > MAX_HORIZON_DAYS {
            return Err(ScheduleError::InvalidConfig(format!(
                "horizon_days must be at most {}, got {}",
                MAX_HORIZON_DAYS, config.horizon_days
            )));
        }
        if let Some((start, end)) = config.closed_dates.iter().find(|(s, e)| s > e) {
            return Err(ScheduleError::InvalidConfig(format!(
                "closed period ends before it starts: {} > {}",
                start, end
            )));
        }

        let horizon = horizon_dates.map(DateHorizon::from_dates).transpose()?;

        Ok(Self {
            records,
            config,
            policy,
            horizon,
        })
    }

    pub fn policy(&self) -> StartDatePolicy {
        self.policy
    }

    /// Validate the order table and resolve every order's start date.
    pub fn resolve(&self) -> Result<Vec<Resolution>, ScheduleError> {
        let validated = validate_orders(&self.records, self.policy)?;
        Ok(resolve_all(&validated.orders, self.policy))
    }

    /// Run the scheduling algorithm.
    pub fn schedule(&self) -> Result<ScheduleResult, ScheduleError> {
        let verbosity = self.config.verbosity;

        // Phase 0: pre-flight validation (fails before any allocation)
        let validated = validate_orders(&self.records, self.policy)?;
        log_changes!(
            verbosity,
            "Scheduling {} orders across {} capacity groups (policy {})",
            validated.orders.len(),
            validated.groups.len(),
            self.policy
        );

        // Phase 1: start date resolution
        let resolutions = resolve_all(&validated.orders, self.policy);
        let starts: Vec<Option<NaiveDate>> = resolutions.iter().map(|r| r.start).collect();

        // Phase 2: greedy allocation into a fresh ledger
        let horizon = self.horizon_for(&starts)?;
        let mut ledger =
            CapacityLedger::new(validated.capacities.clone(), &self.config.closed_dates);
        let allocations = match &horizon {
            Some(horizon) => {
                log_checks!(
                    verbosity,
                    "Horizon: {} to {} ({} dates)",
                    horizon.first(),
                    horizon.last(),
                    horizon.len()
                );
                CapacityAllocator::new(horizon, verbosity).allocate(
                    &validated.orders,
                    &starts,
                    &mut ledger,
                )?
            }
            None => vec![None; validated.orders.len()],
        };

        let mut warnings = Vec::new();
        let mut rows = Vec::with_capacity(validated.orders.len());
        for ((order, resolution), allocation) in validated
            .orders
            .iter()
            .zip(resolutions)
            .zip(allocations)
        {
            let mut row_warnings = resolution.warnings;
            let unschedulable = resolution.start.is_none();
            if unschedulable {
                row_warnings.push("unschedulable: no start date could be resolved".to_string());
            }
            warnings.extend(
                row_warnings
                    .iter()
                    .map(|w| format!("row {} (order {}): {}", order.row, order.order_id, w)),
            );

            let allocation = allocation.unwrap_or_default();
            rows.push(AllocationResult {
                record: self.records[order.row].clone(),
                row: order.row,
                standard_start_date: resolution.standard_start,
                resolved_start_date: resolution.start,
                first_allocation_date: allocation.first_date(),
                schedule_end_date: allocation.last_date(),
                daily_allocation: allocation.daily,
                required_quantity: order.required_quantity,
                total_assigned: allocation.total_assigned,
                unschedulable,
                warnings: row_warnings,
            });
        }

        let groups = group_usage(&validated, &ledger);

        let mut metadata = HashMap::new();
        metadata.insert("algorithm".to_string(), "greedy_earliest_start".to_string());
        metadata.insert("policy".to_string(), self.policy.to_string());
        metadata.insert("orders".to_string(), rows.len().to_string());
        metadata.insert(
            "unschedulable".to_string(),
            rows.iter().filter(|r| r.unschedulable).count().to_string(),
        );
        metadata.insert(
            "under_allocated".to_string(),
            rows.iter()
                .filter(|r| !r.is_fully_allocated())
                .count()
                .to_string(),
        );
        if let Some(horizon) = &horizon {
            metadata.insert("horizon_start".to_string(), horizon.first().to_string());
            metadata.insert("horizon_end".to_string(), horizon.last().to_string());
        }

        Ok(ScheduleResult {
            rows,
            groups,
            warnings,
            metadata,
        })
    }

    /// Explicit horizon, or `horizon_days` from the earliest resolved start.
    fn horizon_for(
        &self,
        starts: &[Option<NaiveDate>],
    ) -> Result<Option<DateHorizon>, ScheduleError> {
        if let Some(horizon) = &self.horizon {
            return Ok(Some(horizon.clone()));
        }
        match starts.iter().flatten().min() {
            Some(earliest) => Ok(Some(DateHorizon::spanning(
                *earliest,
                self.config.horizon_days,
            )?)),
            None => Ok(None),
        }
    }
}

/// Summarize committed usage per group, sorted by group key.
fn group_usage(validated: &ValidatedOrders, ledger: &CapacityLedger) -> Vec<GroupUsage> {
    let mut groups: Vec<GroupUsage> = validated
        .groups
        .iter()
        .map(|(id, key)| {
            let daily_usage = ledger.usage(id);
            GroupUsage {
                factory: key.factory.clone(),
                package_type: key.package_type.clone(),
                daily_capacity: ledger.capacity(id),
                total_committed: daily_usage.values().sum(),
                peak_daily: daily_usage.values().copied().max().unwrap_or(0),
                daily_usage,
            }
        })
        .collect();
    groups.sort_by(|a, b| {
        (&a.factory, &a.package_type).cmp(&(&b.factory, &b.package_type))
    });
    groups
}

/// Validate, resolve and allocate `records` in one call.
pub fn schedule_orders(
    records: Vec<OrderRecord>,
    config: SchedulingConfig,
    horizon_dates: Option<Vec<NaiveDate>>,
) -> Result<ScheduleResult, ScheduleError> {
    PackagingScheduler::new(records, config, horizon_dates)?.schedule()
}

/// Validate `records` and return each order's resolved start date (input order).
pub fn resolve_start_dates(
    records: Vec<OrderRecord>,
    config: SchedulingConfig,
) -> Result<Vec<Option<NaiveDate>>, ScheduleError> {
    let scheduler = PackagingScheduler::new(records, config, None)?;
    Ok(scheduler.resolve()?.into_iter().map(|r| r.start).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::GroupKey;
    use crate::validation::Violation;
    use std::collections::BTreeMap;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn make_record(
        id: &str,
        group: (&str, &str),
        qty: u64,
        capacity: Option<u64>,
        wafer_in: &str,
        actual: Option<&str>,
    ) -> OrderRecord {
        OrderRecord {
            order_id: Some(id.to_string()),
            factory: Some(group.0.to_string()),
            package_type: Some(group.1.to_string()),
            wafer_in: Some(wafer_in.to_string()),
            actual_test_start: actual.map(str::to_string),
            sequencing_days: None,
            grinding_days: None,
            packaging_days: None,
            required_quantity: Some(qty),
            daily_capacity: capacity,
        }
    }

    fn row<'a>(result: &'a ScheduleResult, id: &str) -> &'a AllocationResult {
        result.rows.iter().find(|r| r.order_id() == id).unwrap()
    }

    fn days(pairs: &[(NaiveDate, u64)]) -> BTreeMap<NaiveDate, u64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_two_orders_share_daily_capacity() {
        let records = vec![
            make_record("A", ("fab", "QFN"), 150, Some(100), "2024-01-01", None),
            make_record("B", ("fab", "QFN"), 100, Some(100), "2024-01-01", None),
        ];
        let result = schedule_orders(records, SchedulingConfig::default(), None).unwrap();

        let a = row(&result, "A");
        let b = row(&result, "B");
        assert_eq!(
            a.daily_allocation,
            days(&[(d(2024, 1, 1), 100), (d(2024, 1, 2), 50)])
        );
        assert_eq!(
            b.daily_allocation,
            days(&[(d(2024, 1, 2), 50), (d(2024, 1, 3), 50)])
        );
        assert!(a.is_fully_allocated());
        assert!(b.is_fully_allocated());
        assert_eq!(b.first_allocation_date, Some(d(2024, 1, 2)));
        assert_eq!(b.schedule_end_date, Some(d(2024, 1, 3)));

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].total_committed, 250);
        assert_eq!(result.groups[0].peak_daily, 100);
    }

    #[test]
    fn test_earlier_start_wins_regardless_of_input_order() {
        let records = vec![
            make_record("late", ("fab", "QFN"), 100, Some(100), "2024-01-02", None),
            make_record("early", ("fab", "QFN"), 100, Some(100), "2024-01-01", None),
            make_record("tie", ("fab", "QFN"), 100, Some(100), "2024-01-02", None),
        ];
        let result = schedule_orders(records, SchedulingConfig::default(), None).unwrap();

        assert_eq!(
            row(&result, "early").daily_allocation,
            days(&[(d(2024, 1, 1), 100)])
        );
        assert_eq!(
            row(&result, "late").daily_allocation,
            days(&[(d(2024, 1, 2), 100)])
        );
        // Same start as "late" but later in the input
        assert_eq!(
            row(&result, "tie").daily_allocation,
            days(&[(d(2024, 1, 3), 100)])
        );
        // Output keeps input order
        let ids: Vec<&str> = result.rows.iter().map(|r| r.order_id()).collect();
        assert_eq!(ids, vec!["late", "early", "tie"]);
    }

    #[test]
    fn test_stage_durations_and_actual_date() {
        let mut record = make_record(
            "A",
            ("fab", "QFN"),
            10,
            Some(100),
            "2024-01-01",
            Some("2024-01-05"),
        );
        record.sequencing_days = Some("2".to_string());
        record.grinding_days = Some("3".to_string());
        record.packaging_days = Some("1".to_string());

        let result = schedule_orders(vec![record], SchedulingConfig::default(), None).unwrap();
        let a = row(&result, "A");
        assert_eq!(a.standard_start_date, Some(d(2024, 1, 7)));
        assert_eq!(a.resolved_start_date, Some(d(2024, 1, 5)));
        assert_eq!(a.daily_allocation, days(&[(d(2024, 1, 5), 10)]));
    }

    #[test]
    fn test_missing_capacity_aborts_before_output() {
        let records = vec![
            make_record("A", ("fab", "QFN"), 100, Some(50), "2024-01-01", None),
            make_record("B", ("fab", "BGA"), 100, None, "2024-01-01", None),
        ];
        let err = schedule_orders(records, SchedulingConfig::default(), None).unwrap_err();

        match err {
            ScheduleError::Validation(e) => {
                assert!(e.violations.contains(&Violation::MissingCapacity {
                    group: GroupKey::new("fab", "BGA"),
                }));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_horizon_exhaustion_under_allocates() {
        let records = vec![make_record(
            "A",
            ("fab", "QFN"),
            500,
            Some(100),
            "2024-01-01",
            None,
        )];
        let config = SchedulingConfig {
            horizon_days: 3,
            ..SchedulingConfig::default()
        };
        let result = schedule_orders(records, config, None).unwrap();

        let a = row(&result, "A");
        assert_eq!(a.total_assigned, 300);
        assert_eq!(a.shortfall(), 200);
        assert_eq!(result.metadata.get("under_allocated"), Some(&"1".to_string()));
        assert_eq!(result.metadata.get("horizon_end"), Some(&"2024-01-03".to_string()));
    }

    #[test]
    fn test_explicit_horizon() {
        let records = vec![make_record(
            "A",
            ("fab", "QFN"),
            30,
            Some(10),
            "2024-01-01",
            None,
        )];
        // Weekend (Jan 6-7) left out of the horizon
        let horizon = vec![d(2024, 1, 5), d(2024, 1, 8), d(2024, 1, 9)];
        let result = schedule_orders(records, SchedulingConfig::default(), Some(horizon)).unwrap();

        assert_eq!(
            row(&result, "A").daily_allocation,
            days(&[(d(2024, 1, 5), 10), (d(2024, 1, 8), 10), (d(2024, 1, 9), 10)])
        );
        assert_eq!(result.metadata.get("horizon_start"), Some(&"2024-01-05".to_string()));
    }

    #[test]
    fn test_closed_dates_are_skipped() {
        let records = vec![make_record(
            "A",
            ("fab", "QFN"),
            20,
            Some(10),
            "2024-01-01",
            None,
        )];
        let config = SchedulingConfig {
            closed_dates: vec![(d(2024, 1, 2), d(2024, 1, 3))],
            ..SchedulingConfig::default()
        };
        let result = schedule_orders(records, config, None).unwrap();

        assert_eq!(
            row(&result, "A").daily_allocation,
            days(&[(d(2024, 1, 1), 10), (d(2024, 1, 4), 10)])
        );
    }

    #[test]
    fn test_unschedulable_row_does_not_stop_others() {
        let records = vec![
            make_record("bad", ("fab", "QFN"), 100, Some(100), "someday", None),
            make_record("good", ("fab", "QFN"), 100, Some(100), "2024-01-01", None),
        ];
        let result = schedule_orders(records, SchedulingConfig::default(), None).unwrap();

        let bad = row(&result, "bad");
        assert!(bad.unschedulable);
        assert_eq!(bad.resolved_start_date, None);
        assert_eq!(bad.total_assigned, 0);
        assert!(!bad.warnings.is_empty());

        assert!(row(&result, "good").is_fully_allocated());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("row 0 (order bad)")));
        assert_eq!(result.metadata.get("unschedulable"), Some(&"1".to_string()));
        assert_eq!(result.under_allocated().count(), 1);
    }

    #[test]
    fn test_all_unschedulable_without_horizon() {
        let records = vec![make_record("A", ("fab", "QFN"), 10, Some(10), "", None)];
        let result = schedule_orders(records, SchedulingConfig::default(), None).unwrap();

        assert!(result.rows[0].unschedulable);
        assert!(result.metadata.get("horizon_start").is_none());
    }

    #[test]
    fn test_strict_policy() {
        let records = vec![
            make_record("A", ("fab", "QFN"), 10, Some(10), "2024-01-01", Some("2024-01-20")),
            make_record("B", ("fab", "QFN"), 10, Some(10), "2024-01-01", None),
        ];
        let config = SchedulingConfig {
            start_date_policy: "override_required".to_string(),
            ..SchedulingConfig::default()
        };

        // B has no actual test start date: the whole run is rejected
        let err = schedule_orders(records.clone(), config.clone(), None).unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)));

        let result = schedule_orders(records[..1].to_vec(), config, None).unwrap();
        assert_eq!(
            row(&result, "A").resolved_start_date,
            Some(d(2024, 1, 20))
        );
    }

    #[test]
    fn test_invalid_config() {
        let bad_policy = SchedulingConfig {
            start_date_policy: "latest_wins".to_string(),
            ..SchedulingConfig::default()
        };
        match PackagingScheduler::new(vec![], bad_policy, None) {
            Err(ScheduleError::InvalidConfig(msg)) => assert!(msg.contains("latest_wins")),
            other => panic!("expected InvalidConfig, got {:?}", other.err()),
        }

        let zero_horizon = SchedulingConfig {
            horizon_days: 0,
            ..SchedulingConfig::default()
        };
        assert!(matches!(
            PackagingScheduler::new(vec![], zero_horizon, None),
            Err(ScheduleError::InvalidConfig(_))
        ));

        assert!(matches!(
            PackagingScheduler::new(vec![], SchedulingConfig::default(), Some(vec![])),
            Err(ScheduleError::EmptyHorizon)
        ));
    }

    #[test]
    fn test_horizon_days_limit() {
        let huge = SchedulingConfig {
            horizon_days: u32::MAX,
            ..SchedulingConfig::default()
        };
        assert!(matches!(
            PackagingScheduler::new(vec![], huge.clone(), None),
            Err(ScheduleError::InvalidConfig(_))
        ));
        // Only the generated horizon is bounded
        assert!(PackagingScheduler::new(vec![], huge, Some(vec![d(2024, 1, 1)])).is_ok());

        let longest = SchedulingConfig {
            horizon_days: MAX_HORIZON_DAYS,
            ..SchedulingConfig::default()
        };
        let records = vec![make_record("A", ("fab", "QFN"), 10, Some(10), "2024-01-01", None)];
        let result = schedule_orders(records, longest, None).unwrap();
        assert_eq!(result.rows[0].total_assigned, 10);
    }

    #[test]
    fn test_resolve_start_dates() {
        let records = vec![
            make_record("A", ("fab", "QFN"), 10, Some(10), "2024-01-03", None),
            make_record("B", ("fab", "QFN"), 10, Some(10), "junk", None),
        ];
        let starts = resolve_start_dates(records, SchedulingConfig::default()).unwrap();
        assert_eq!(starts, vec![Some(d(2024, 1, 3)), None]);
    }

    /// A mixed workload exercising several groups and staggered starts.
    fn mixed_workload() -> Vec<OrderRecord> {
        let groups = [("fab1", "QFN"), ("fab1", "BGA"), ("fab2", "QFN")];
        let capacities = [120, 75, 40];
        (0..24)
            .map(|i| {
                let g = i % groups.len();
                let wafer_in = d(2024, 3, 1)
                    .checked_add_days(chrono::Days::new((i * 7 % 5) as u64))
                    .unwrap();
                make_record(
                    &format!("order-{i}"),
                    groups[g],
                    50 + (i as u64 * 37) % 200,
                    Some(capacities[g]),
                    &wafer_in.to_string(),
                    None,
                )
            })
            .collect()
    }

    #[test]
    fn test_capacity_never_exceeded_and_no_early_allocation() {
        let result = schedule_orders(mixed_workload(), SchedulingConfig::default(), None).unwrap();

        let mut per_group_day: HashMap<(String, String, NaiveDate), u64> = HashMap::new();
        for r in &result.rows {
            let start = r.resolved_start_date.unwrap();
            for (date, qty) in &r.daily_allocation {
                assert!(*date >= start, "{} allocated before its start", r.order_id());
                *per_group_day
                    .entry((
                        r.record.factory.clone().unwrap(),
                        r.record.package_type.clone().unwrap(),
                        *date,
                    ))
                    .or_insert(0) += qty;
            }
            // 60-day horizon is plenty for this workload
            assert!(r.is_fully_allocated(), "{} under-allocated", r.order_id());
            assert_eq!(r.daily_allocation.values().sum::<u64>(), r.total_assigned);
        }

        for ((factory, package_type, date), total) in &per_group_day {
            let cap = result
                .groups
                .iter()
                .find(|g| &g.factory == factory && &g.package_type == package_type)
                .unwrap()
                .daily_capacity;
            assert!(*total <= cap, "{factory}/{package_type} over capacity on {date}");
        }

        // Group summaries agree with the rows
        let committed: u64 = result.groups.iter().map(|g| g.total_committed).sum();
        let assigned: u64 = result.rows.iter().map(|r| r.total_assigned).sum();
        assert_eq!(committed, assigned);
    }

    #[test]
    fn test_deterministic() {
        let scheduler =
            PackagingScheduler::new(mixed_workload(), SchedulingConfig::default(), None).unwrap();
        let first = scheduler.schedule().unwrap();
        let second = scheduler.schedule().unwrap();

        assert_eq!(first.rows, second.rows);
        assert_eq!(first.groups, second.groups);
        assert_eq!(first.warnings, second.warnings);
    }
}
