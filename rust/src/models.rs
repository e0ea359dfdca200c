//! Core data types for the packaging scheduler.

use chrono::NaiveDate;
use pyo3::prelude::*;
use std::collections::{BTreeMap, HashMap};

use crate::interner::GroupId;
use crate::parsing::{parse_date, parse_days, Parsed};

// Note: We use std HashMap/BTreeMap here for PyO3 interface compatibility

/// One raw row of the order table, as handed over by the extraction layer.
///
/// Every field is optional so pre-flight validation can report all missing
/// fields at once instead of failing on the first.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderRecord {
    #[pyo3(get, set)]
    pub order_id: Option<String>,
    #[pyo3(get, set)]
    pub factory: Option<String>,
    #[pyo3(get, set)]
    pub package_type: Option<String>,
    /// Wafer-in date cell (raw text).
    #[pyo3(get, set)]
    pub wafer_in: Option<String>,
    /// Actual test start date cell (raw text).
    #[pyo3(get, set)]
    pub actual_test_start: Option<String>,
    #[pyo3(get, set)]
    pub sequencing_days: Option<String>,
    #[pyo3(get, set)]
    pub grinding_days: Option<String>,
    #[pyo3(get, set)]
    pub packaging_days: Option<String>,
    #[pyo3(get, set)]
    pub required_quantity: Option<u64>,
    /// Daily capacity allocated to this order's (factory, package type) group.
    #[pyo3(get, set)]
    pub daily_capacity: Option<u64>,
}

#[pymethods]
impl OrderRecord {
    #[new]
    #[pyo3(signature = (
        order_id=None,
        factory=None,
        package_type=None,
        wafer_in=None,
        actual_test_start=None,
        sequencing_days=None,
        grinding_days=None,
        packaging_days=None,
        required_quantity=None,
        daily_capacity=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        order_id: Option<String>,
        factory: Option<String>,
        package_type: Option<String>,
        wafer_in: Option<String>,
        actual_test_start: Option<String>,
        sequencing_days: Option<String>,
        grinding_days: Option<String>,
        packaging_days: Option<String>,
        required_quantity: Option<u64>,
        daily_capacity: Option<u64>,
    ) -> Self {
        Self {
            order_id,
            factory,
            package_type,
            wafer_in,
            actual_test_start,
            sequencing_days,
            grinding_days,
            packaging_days,
            required_quantity,
            daily_capacity,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "OrderRecord(order_id={:?}, factory={:?}, package_type={:?}, required_quantity={:?})",
            self.order_id, self.factory, self.package_type, self.required_quantity
        )
    }
}

/// Process stage cycle times that make up an order's lead time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageDurations {
    pub sequencing: Parsed<u32>,
    pub grinding: Parsed<u32>,
    pub packaging: Parsed<u32>,
}

impl StageDurations {
    pub fn from_record(record: &OrderRecord) -> Self {
        Self {
            sequencing: parse_days(record.sequencing_days.as_deref()),
            grinding: parse_days(record.grinding_days.as_deref()),
            packaging: parse_days(record.packaging_days.as_deref()),
        }
    }

    /// Total lead time in days. Missing or unreadable stages contribute nothing.
    pub fn total_days(&self) -> u64 {
        self.stages()
            .iter()
            .filter_map(|(_, stage)| stage.get())
            .map(u64::from)
            .sum()
    }

    /// Data-quality warnings for stages that held unreadable values.
    pub fn warnings(&self) -> Vec<String> {
        self.stages()
            .iter()
            .filter_map(|(name, stage)| match stage {
                Parsed::Invalid(raw) => Some(format!(
                    "{name}: unreadable duration {raw:?} counted as 0 days"
                )),
                _ => None,
            })
            .collect()
    }

    fn stages(&self) -> [(&'static str, &Parsed<u32>); 3] {
        [
            ("sequencing_days", &self.sequencing),
            ("grinding_days", &self.grinding),
            ("packaging_days", &self.packaging),
        ]
    }
}

/// A validated order, ready for start-date resolution and allocation.
#[derive(Clone, Debug)]
pub struct Order {
    /// Position of the source record in the input table.
    pub row: usize,
    pub order_id: String,
    pub group: GroupId,
    pub wafer_in: Parsed<NaiveDate>,
    pub actual_test_start: Parsed<NaiveDate>,
    pub stages: StageDurations,
    pub required_quantity: u64,
}

impl Order {
    /// Build a typed order from a record whose required fields are present.
    pub fn from_record(
        row: usize,
        order_id: String,
        group: GroupId,
        required_quantity: u64,
        record: &OrderRecord,
    ) -> Self {
        Self {
            row,
            order_id,
            group,
            wafer_in: parse_date(record.wafer_in.as_deref()),
            actual_test_start: parse_date(record.actual_test_start.as_deref()),
            stages: StageDurations::from_record(record),
            required_quantity,
        }
    }
}

/// Allocation outcome for one order (one output row).
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationResult {
    /// The input record, unchanged.
    #[pyo3(get)]
    pub record: OrderRecord,
    #[pyo3(get)]
    pub row: usize,
    /// Wafer-in date plus stage lead time, when computable.
    #[pyo3(get)]
    pub standard_start_date: Option<NaiveDate>,
    /// Earliest date allocation was allowed to begin.
    #[pyo3(get)]
    pub resolved_start_date: Option<NaiveDate>,
    /// Quantity assigned per date (sparse; only dates that received units).
    #[pyo3(get)]
    pub daily_allocation: BTreeMap<NaiveDate, u64>,
    /// First date with assigned units (suggested launch date).
    #[pyo3(get)]
    pub first_allocation_date: Option<NaiveDate>,
    /// Last date with assigned units.
    #[pyo3(get)]
    pub schedule_end_date: Option<NaiveDate>,
    #[pyo3(get)]
    pub required_quantity: u64,
    #[pyo3(get)]
    pub total_assigned: u64,
    /// True when no start date could be resolved; such orders get no allocation.
    #[pyo3(get)]
    pub unschedulable: bool,
    #[pyo3(get)]
    pub warnings: Vec<String>,
}

impl AllocationResult {
    /// Units the horizon could not absorb.
    pub fn shortfall(&self) -> u64 {
        self.required_quantity.saturating_sub(self.total_assigned)
    }

    pub fn is_fully_allocated(&self) -> bool {
        self.total_assigned == self.required_quantity
    }

    /// Order ID of the source record (empty if somehow absent).
    pub fn order_id(&self) -> &str {
        self.record.order_id.as_deref().unwrap_or_default()
    }
}

#[pymethods]
impl AllocationResult {
    #[getter(shortfall)]
    fn py_shortfall(&self) -> u64 {
        self.shortfall()
    }

    #[getter(fully_allocated)]
    fn py_fully_allocated(&self) -> bool {
        self.is_fully_allocated()
    }

    fn __repr__(&self) -> String {
        format!(
            "AllocationResult(order_id={:?}, start={:?}, assigned={}/{}, days={})",
            self.record.order_id,
            self.resolved_start_date,
            self.total_assigned,
            self.required_quantity,
            self.daily_allocation.len()
        )
    }
}

/// Committed usage of one capacity group over the run.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupUsage {
    #[pyo3(get)]
    pub factory: String,
    #[pyo3(get)]
    pub package_type: String,
    #[pyo3(get)]
    pub daily_capacity: u64,
    #[pyo3(get)]
    pub total_committed: u64,
    /// Highest single-day usage.
    #[pyo3(get)]
    pub peak_daily: u64,
    #[pyo3(get)]
    pub daily_usage: BTreeMap<NaiveDate, u64>,
}

#[pymethods]
impl GroupUsage {
    fn __repr__(&self) -> String {
        format!(
            "GroupUsage(factory={:?}, package_type={:?}, capacity={}, committed={}, peak={})",
            self.factory, self.package_type, self.daily_capacity, self.total_committed, self.peak_daily
        )
    }
}

/// Result of one scheduling run.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct ScheduleResult {
    /// One row per input record, in input order.
    #[pyo3(get)]
    pub rows: Vec<AllocationResult>,
    /// Per-group usage, sorted by (factory, package type).
    #[pyo3(get)]
    pub groups: Vec<GroupUsage>,
    /// Data-quality warnings across all rows, prefixed with row and order ID.
    #[pyo3(get)]
    pub warnings: Vec<String>,
    #[pyo3(get)]
    pub metadata: HashMap<String, String>,
}

impl ScheduleResult {
    /// Rows that received less than their required quantity.
    pub fn under_allocated(&self) -> impl Iterator<Item = &AllocationResult> {
        self.rows.iter().filter(|r| !r.is_fully_allocated())
    }
}

#[pymethods]
impl ScheduleResult {
    /// Order IDs that were not fully allocated (including unschedulable ones).
    fn under_allocated_orders(&self) -> Vec<String> {
        self.under_allocated()
            .map(|r| r.order_id().to_string())
            .collect()
    }

    fn __repr__(&self) -> String {
        format!(
            "ScheduleResult(rows={}, groups={}, warnings={})",
            self.rows.len(),
            self.groups.len(),
            self.warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_stages(seq: Option<&str>, grind: Option<&str>, pack: Option<&str>) -> OrderRecord {
        OrderRecord {
            sequencing_days: seq.map(str::to_string),
            grinding_days: grind.map(str::to_string),
            packaging_days: pack.map(str::to_string),
            ..OrderRecord::default()
        }
    }

    #[test]
    fn test_stage_total_days() {
        let stages = StageDurations::from_record(&record_with_stages(Some("2"), Some("3"), Some("1")));
        assert_eq!(stages.total_days(), 6);
        assert!(stages.warnings().is_empty());
    }

    #[test]
    fn test_stage_missing_and_invalid_count_as_zero() {
        let stages = StageDurations::from_record(&record_with_stages(None, Some("n/a"), Some("4")));
        assert_eq!(stages.total_days(), 4);
        assert!(stages.sequencing.is_missing());

        let warnings = stages.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("grinding_days"));
    }

    #[test]
    fn test_allocation_result_shortfall() {
        let result = AllocationResult {
            record: OrderRecord {
                order_id: Some("A".to_string()),
                ..OrderRecord::default()
            },
            row: 0,
            standard_start_date: None,
            resolved_start_date: None,
            daily_allocation: BTreeMap::new(),
            first_allocation_date: None,
            schedule_end_date: None,
            required_quantity: 500,
            total_assigned: 300,
            unschedulable: false,
            warnings: vec![],
        };
        assert_eq!(result.shortfall(), 200);
        assert!(!result.is_fully_allocated());
        assert_eq!(result.order_id(), "A");
    }
}
