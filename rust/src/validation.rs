//! Pre-flight validation of the order table.
//!
//! Every violation is collected before failing so the caller can fix the
//! whole input in one pass. Nothing is allocated if any violation is found.

use std::fmt;

use crate::interner::{GroupId, GroupInterner, GroupKey};
use crate::models::{Order, OrderRecord};
use crate::parsing::{parse_date, Parsed};
use crate::start_date::StartDatePolicy;

/// A single reason the order table cannot be scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Required fields absent on a row.
    MissingFields {
        row: usize,
        order_id: Option<String>,
        fields: Vec<&'static str>,
    },
    /// No row of the group carries a daily capacity.
    MissingCapacity { group: GroupKey },
    /// Rows of the same group disagree on daily capacity.
    InconsistentCapacity { group: GroupKey, capacities: Vec<u64> },
    /// Actual test start date is mandatory under the strict policy.
    MissingActualTestStart {
        row: usize,
        order_id: Option<String>,
    },
    /// Actual test start date present but unreadable under the strict policy.
    InvalidActualTestStart {
        row: usize,
        order_id: Option<String>,
        value: String,
    },
}

fn write_row(f: &mut fmt::Formatter<'_>, row: usize, order_id: &Option<String>) -> fmt::Result {
    write!(f, "row {}", row)?;
    if let Some(id) = order_id {
        write!(f, " (order {})", id)?;
    }
    Ok(())
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingFields {
                row,
                order_id,
                fields,
            } => {
                write_row(f, *row, order_id)?;
                write!(f, ": missing required fields: {}", fields.join(", "))
            }
            Violation::MissingCapacity { group } => {
                write!(f, "group {}: no daily capacity recorded", group)
            }
            Violation::InconsistentCapacity { group, capacities } => {
                write!(
                    f,
                    "group {}: conflicting daily capacities {:?}",
                    group, capacities
                )
            }
            Violation::MissingActualTestStart { row, order_id } => {
                write_row(f, *row, order_id)?;
                write!(f, ": actual test start date is required")
            }
            Violation::InvalidActualTestStart {
                row,
                order_id,
                value,
            } => {
                write_row(f, *row, order_id)?;
                write!(f, ": unreadable actual test start date {:?}", value)
            }
        }
    }
}

/// All violations found in an order table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order table failed validation ({} problem(s)):",
            self.violations.len()
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Orders that passed validation, with their interned capacity groups.
#[derive(Debug, Clone)]
pub struct ValidatedOrders {
    /// One order per input record, in input order.
    pub orders: Vec<Order>,
    pub groups: GroupInterner,
    /// Daily capacity per group, indexed by `GroupId`.
    pub capacities: Vec<u64>,
}

fn non_blank(cell: &Option<String>) -> Option<&str> {
    cell.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn missing_fields(record: &OrderRecord) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if non_blank(&record.order_id).is_none() {
        fields.push("order_id");
    }
    if non_blank(&record.factory).is_none() {
        fields.push("factory");
    }
    if non_blank(&record.package_type).is_none() {
        fields.push("package_type");
    }
    if record.required_quantity.is_none() {
        fields.push("required_quantity");
    }
    if record.daily_capacity.is_none() {
        fields.push("daily_capacity");
    }
    fields
}

/// Strict-policy check on the raw cell, independent of the other fields.
fn actual_test_start_violation(row: usize, record: &OrderRecord) -> Option<Violation> {
    let order_id = non_blank(&record.order_id).map(str::to_string);
    match parse_date(record.actual_test_start.as_deref()) {
        Parsed::Value(_) => None,
        Parsed::Missing => Some(Violation::MissingActualTestStart { row, order_id }),
        Parsed::Invalid(value) => Some(Violation::InvalidActualTestStart {
            row,
            order_id,
            value,
        }),
    }
}

/// Validate the order table and build typed orders.
///
/// # Returns
/// * `Ok(ValidatedOrders)` when every record is complete and every group has
///   exactly one daily capacity
/// * `Err(ValidationError)` listing every problem found
pub fn validate_orders(
    records: &[OrderRecord],
    policy: StartDatePolicy,
) -> Result<ValidatedOrders, ValidationError> {
    let mut violations = Vec::new();
    let mut groups = GroupInterner::with_capacity(records.len());
    // Distinct capacities seen per group, in first-seen order
    let mut seen_capacities: Vec<Vec<u64>> = Vec::new();
    let mut orders = Vec::with_capacity(records.len());

    for (row, record) in records.iter().enumerate() {
        let group: Option<GroupId> =
            match (non_blank(&record.factory), non_blank(&record.package_type)) {
                (Some(factory), Some(package_type)) => {
                    let id = groups.intern(&GroupKey::new(factory, package_type));
                    if id as usize == seen_capacities.len() {
                        seen_capacities.push(Vec::new());
                    }
                    if let Some(capacity) = record.daily_capacity {
                        let seen = &mut seen_capacities[id as usize];
                        if !seen.contains(&capacity) {
                            seen.push(capacity);
                        }
                    }
                    Some(id)
                }
                _ => None,
            };

        let missing = missing_fields(record);
        let incomplete = !missing.is_empty();
        if incomplete {
            violations.push(Violation::MissingFields {
                row,
                order_id: non_blank(&record.order_id).map(str::to_string),
                fields: missing,
            });
        }
        if policy == StartDatePolicy::OverrideRequired {
            violations.extend(actual_test_start_violation(row, record));
        }
        if incomplete {
            continue;
        }

        let (Some(order_id), Some(group), Some(required_quantity)) = (
            non_blank(&record.order_id),
            group,
            record.required_quantity,
        ) else {
            continue;
        };

        orders.push(Order::from_record(
            row,
            order_id.to_string(),
            group,
            required_quantity,
            record,
        ));
    }

    for (id, key) in groups.iter() {
        let seen = &seen_capacities[id as usize];
        match seen.len() {
            0 => violations.push(Violation::MissingCapacity { group: key.clone() }),
            1 => {}
            _ => violations.push(Violation::InconsistentCapacity {
                group: key.clone(),
                capacities: seen.clone(),
            }),
        }
    }

    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    let capacities = seen_capacities
        .iter()
        .map(|seen| seen.first().copied().unwrap_or(0))
        .collect();

    Ok(ValidatedOrders {
        orders,
        groups,
        capacities,
    })
}
