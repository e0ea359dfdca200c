//! Capacity-constrained production scheduling for semiconductor packaging orders.
//!
//! Given an order table, this crate resolves each order's earliest start date
//! and assigns its quantity day by day without exceeding the daily capacity of
//! its (factory, package type) group. It is usable from Rust directly and from
//! Python as the `packsched.rust` extension module.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::prelude::*;

mod config;
mod interner;
pub mod logging;
mod models;
pub mod parsing;
pub mod scheduler;
pub mod start_date;
pub mod validation;

pub use config::{SchedulingConfig, DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS};
pub use interner::{GroupId, GroupInterner, GroupKey};
pub use models::{
    AllocationResult, GroupUsage, Order, OrderRecord, ScheduleResult, StageDurations,
};
pub use parsing::{parse_date, parse_days, Parsed};
pub use scheduler::{
    resolve_start_dates, schedule_orders, CapacityLedger, DateHorizon, PackagingScheduler,
    ScheduleError,
};
pub use start_date::{resolve_start_date, Resolution, StartDatePolicy};
pub use validation::{validate_orders, ValidationError, Violation};

fn to_py_err(err: ScheduleError) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(err.to_string())
}

/// Resolve the earliest start date of every order.
///
/// # Arguments
/// * `records` - Order table rows
/// * `config` - Scheduling configuration (only the start date policy is used)
///
/// # Returns
/// * One date per record, in input order; None where no date could be resolved
///
/// # Raises
/// * ValueError if the table fails validation or the policy is unknown
#[pyfunction]
#[pyo3(name = "resolve_start_dates", signature = (records, config=None))]
fn py_resolve_start_dates(
    records: Vec<OrderRecord>,
    config: Option<SchedulingConfig>,
) -> PyResult<Vec<Option<NaiveDate>>> {
    resolve_start_dates(records, config.unwrap_or_default()).map_err(to_py_err)
}

/// Schedule the order table against per-group daily capacity.
///
/// # Arguments
/// * `records` - Order table rows
/// * `config` - Scheduling configuration
/// * `horizon` - Candidate allocation dates; generated from the earliest start when omitted
///
/// # Returns
/// * ScheduleResult with one AllocationResult per record and per-group usage
///
/// # Raises
/// * ValueError listing every validation problem, or for invalid configuration
#[pyfunction]
#[pyo3(name = "schedule_orders", signature = (records, config=None, horizon=None))]
fn py_schedule_orders(
    records: Vec<OrderRecord>,
    config: Option<SchedulingConfig>,
    horizon: Option<Vec<NaiveDate>>,
) -> PyResult<ScheduleResult> {
    schedule_orders(records, config.unwrap_or_default(), horizon).map_err(to_py_err)
}

/// The packsched.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Core data types
    m.add_class::<OrderRecord>()?;
    m.add_class::<AllocationResult>()?;
    m.add_class::<GroupUsage>()?;
    m.add_class::<ScheduleResult>()?;

    // Config types
    m.add_class::<SchedulingConfig>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(py_resolve_start_dates, m)?)?;
    m.add_function(wrap_pyfunction!(py_schedule_orders, m)?)?;

    Ok(())
}
